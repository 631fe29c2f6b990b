// One stereo frame, the unit every voice renders into the bus
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn mono(x: f32) -> Self {
        Self { left: x, right: x }
    }

    #[inline]
    pub fn scaled(self, gain: f32) -> Self {
        Self {
            left: self.left * gain,
            right: self.right * gain,
        }
    }

    #[inline]
    pub fn accumulate(&mut self, other: StereoFrame) {
        self.left += other.left;
        self.right += other.right;
    }

    pub fn peak(&self) -> f32 {
        self.left.abs().max(self.right.abs())
    }
}
