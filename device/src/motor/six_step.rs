//! 6-step commutation logic for BLDC motor control

/// What one phase does during a step
#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
pub enum Drive {
    /// PWM at the full step duty
    High,
    /// Held at the low rail (zero duty)
    Low,
    /// Parked at half the step duty, midway between the other two
    Float,
}

/// 6-step commutation state
///
/// Each step energizes 2 of the 3 phases:
/// - One phase driven high
/// - One phase driven low
/// - One phase floating
#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
#[repr(u8)]
pub enum CommutationStep {
    Step0 = 0, // A+, B-, C floating
    Step1 = 1, // A+, C-, B floating
    Step2 = 2, // B+, C-, A floating
    Step3 = 3, // B+, A-, C floating
    Step4 = 4, // C+, A-, B floating
    Step5 = 5, // C+, B-, A floating
}

impl CommutationStep {
    /// Advance to the next commutation step
    pub fn next(self) -> Self {
        match self {
            Self::Step0 => Self::Step1,
            Self::Step1 => Self::Step2,
            Self::Step2 => Self::Step3,
            Self::Step3 => Self::Step4,
            Self::Step4 => Self::Step5,
            Self::Step5 => Self::Step0,
        }
    }

    /// Get the step number (0-5)
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Drive pattern of phases A, B, C for this step
    pub fn drives(self) -> [Drive; 3] {
        use Drive::*;
        match self {
            Self::Step0 => [High, Low, Float],
            Self::Step1 => [High, Float, Low],
            Self::Step2 => [Float, High, Low],
            Self::Step3 => [Low, High, Float],
            Self::Step4 => [Low, Float, High],
            Self::Step5 => [Float, Low, High],
        }
    }

    /// Per-phase duty values for this step at `duty`
    pub fn duties(self, duty: u16) -> [u16; 3] {
        self.drives().map(|drive| match drive {
            Drive::High => duty,
            Drive::Low => 0,
            Drive::Float => duty / 2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_sequence() {
        let mut step = CommutationStep::Step0;
        for i in 1..=6 {
            step = step.next();
            assert_eq!(step.as_u8(), i % 6);
        }
    }

    #[test]
    fn test_each_step_has_one_high_one_low() {
        let mut step = CommutationStep::Step0;
        for _ in 0..6 {
            let drives = step.drives();
            assert_eq!(drives.iter().filter(|d| **d == Drive::High).count(), 1);
            assert_eq!(drives.iter().filter(|d| **d == Drive::Low).count(), 1);
            // Consecutive steps swap the floating phase with one driven phase
            let next = step.next().drives();
            assert_eq!(drives.iter().zip(next.iter()).filter(|(a, b)| a != b).count(), 2);
            step = step.next();
        }
    }

    #[test]
    fn test_duties() {
        assert_eq!(CommutationStep::Step0.duties(300), [300, 0, 150]);
        assert_eq!(CommutationStep::Step4.duties(300), [0, 150, 300]);
    }
}
