use super::phase::Phase;

/// どの遷移で1レップ完了とみなすか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepCompletion {
    /// flexed で準備、extended で完了（カール）
    FlexToExtend,
    /// extended で準備、flexed で完了（プレス: ラック位置への戻り）
    ExtendToFlex,
}

impl RepCompletion {
    fn arm_phase(self) -> Phase {
        match self {
            Self::FlexToExtend => Phase::Flexed,
            Self::ExtendToFlex => Phase::Extended,
        }
    }

    fn complete_phase(self) -> Phase {
        match self {
            Self::FlexToExtend => Phase::Extended,
            Self::ExtendToFlex => Phase::Flexed,
        }
    }
}

/// 確定フェーズの切り替わりからレップを数える
///
/// 準備・完了とも、そのフェーズに入ったフレームでのみ反応する。
/// アクティブゾーン外では準備状態を解除し、ゾーン外で入ったフェーズは準備にならない。
/// カウントは減らない。
#[derive(Debug, Clone)]
pub struct RepCounter {
    completion: RepCompletion,
    count: u32,
    armed: bool,
    last_phase: Phase,
}

impl RepCounter {
    pub fn new(completion: RepCompletion) -> Self {
        Self {
            completion,
            count: 0,
            armed: false,
            last_phase: Phase::Unknown,
        }
    }

    /// 現在の確定フェーズを渡す。このフレームでレップが完了したら true
    pub fn update(&mut self, phase: Phase, in_zone: bool) -> bool {
        let entered = phase != self.last_phase;
        self.last_phase = phase;

        if !in_zone {
            self.armed = false;
            return false;
        }
        if !entered {
            return false;
        }
        if phase == self.completion.arm_phase() {
            self.armed = true;
        } else if phase == self.completion.complete_phase() && self.armed {
            self.armed = false;
            self.count += 1;
            return true;
        }
        false
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn completion(&self) -> RepCompletion {
        self.completion
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.armed = false;
        self.last_phase = Phase::Unknown;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::PhaseDetector;

    fn hold(d: &mut PhaseDetector, r: &mut RepCounter, angle: f32, n: usize) -> u32 {
        let mut reps = 0;
        for _ in 0..n {
            d.update(angle);
            if r.update(d.phase(), true) {
                reps += 1;
            }
        }
        reps
    }

    #[test]
    fn test_flex_extend_flex_extend_is_two_reps() {
        let mut d = PhaseDetector::new(70.0, 140.0);
        let mut r = RepCounter::new(RepCompletion::FlexToExtend);
        let mut edges = 0;
        for angle in [50.0, 170.0, 50.0, 170.0] {
            edges += hold(&mut d, &mut r, angle, 10);
        }
        assert_eq!(edges, 2);
        assert_eq!(r.count(), 2);
    }

    #[test]
    fn test_starting_extended_does_not_count() {
        let mut d = PhaseDetector::new(70.0, 140.0);
        let mut r = RepCounter::new(RepCompletion::FlexToExtend);
        hold(&mut d, &mut r, 170.0, 10);
        assert_eq!(r.count(), 0);
        assert!(!r.is_armed());
        hold(&mut d, &mut r, 50.0, 10);
        assert!(r.is_armed());
    }

    #[test]
    fn test_middle_does_not_disarm() {
        let mut r = RepCounter::new(RepCompletion::FlexToExtend);
        r.update(Phase::Flexed, true);
        r.update(Phase::Middle, true);
        assert!(r.is_armed());
        assert!(r.update(Phase::Extended, true));
        assert!(!r.update(Phase::Extended, true));
        assert_eq!(r.count(), 1);
    }

    #[test]
    fn test_extend_to_flex() {
        let mut r = RepCounter::new(RepCompletion::ExtendToFlex);
        assert!(!r.update(Phase::Flexed, true));
        r.update(Phase::Extended, true);
        assert!(r.update(Phase::Flexed, true));
        assert_eq!(r.count(), 1);
    }

    #[test]
    fn test_outside_zone_disarms() {
        let mut r = RepCounter::new(RepCompletion::ExtendToFlex);
        r.update(Phase::Extended, true);
        assert!(r.is_armed());
        assert!(!r.update(Phase::Flexed, false));
        assert!(!r.is_armed());
        assert!(!r.update(Phase::Flexed, true));
        assert_eq!(r.count(), 0);
    }

    #[test]
    fn test_phase_entered_outside_zone_does_not_arm() {
        // 腕を下ろした extended のままゾーンに入ってもレップにならない
        let mut r = RepCounter::new(RepCompletion::ExtendToFlex);
        r.update(Phase::Extended, false);
        r.update(Phase::Extended, true);
        assert!(!r.is_armed());
        r.update(Phase::Middle, true);
        assert!(!r.update(Phase::Flexed, true));
        assert_eq!(r.count(), 0);
    }
}
