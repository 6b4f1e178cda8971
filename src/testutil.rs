//! Synthetic landmark frames for unit tests.

use crate::exercise::Side;
use crate::pose::{Landmark, LandmarkFrame, LandmarkId};

const VIS: f32 = 0.9;
const FOREARM: f32 = 0.15;

fn lm(x: f32, y: f32) -> Landmark {
    Landmark::new(x, y, VIS)
}

fn with_torso(frame: LandmarkFrame) -> LandmarkFrame {
    frame
        .with(LandmarkId::Nose, lm(0.5, 0.15))
        .with(LandmarkId::RightShoulder, lm(0.40, 0.30))
        .with(LandmarkId::LeftShoulder, lm(0.60, 0.30))
        .with(LandmarkId::RightHip, lm(0.42, 0.60))
        .with(LandmarkId::LeftHip, lm(0.58, 0.60))
}

/// 上腕を真下に下ろし、肘角度 `right`/`left`（度）で前腕を上げた正面フレーム
pub fn curl_front(right: f32, left: f32) -> LandmarkFrame {
    let forearm = |angle: f32, sign: f32| {
        let a = angle.to_radians();
        [sign * FOREARM * a.sin(), -FOREARM * a.cos()]
    };
    let r = forearm(right, -1.0);
    let l = forearm(left, 1.0);
    with_torso(LandmarkFrame::new())
        .with(LandmarkId::RightElbow, lm(0.40, 0.45))
        .with(LandmarkId::LeftElbow, lm(0.60, 0.45))
        .with(LandmarkId::RightWrist, lm(0.40 + r[0], 0.45 + r[1]))
        .with(LandmarkId::LeftWrist, lm(0.60 + l[0], 0.45 + l[1]))
}

/// 両腕を下ろした立位
pub fn hanging() -> LandmarkFrame {
    curl_front(180.0, 180.0)
}

/// プレスのラック位置（肘は肩より下で外側、手首は肘の真上）
pub fn press_rack() -> LandmarkFrame {
    with_torso(LandmarkFrame::new())
        .with(LandmarkId::RightElbow, lm(0.30, 0.38))
        .with(LandmarkId::LeftElbow, lm(0.70, 0.38))
        .with(LandmarkId::RightWrist, lm(0.30, 0.25))
        .with(LandmarkId::LeftWrist, lm(0.70, 0.25))
}

/// 両腕を頭上に伸ばした位置。`left_offset` だけ左手首を外側へずらす
pub fn press_top_with(left_offset: f32) -> LandmarkFrame {
    with_torso(LandmarkFrame::new())
        .with(LandmarkId::RightElbow, lm(0.40, 0.17))
        .with(LandmarkId::LeftElbow, lm(0.60, 0.17))
        .with(LandmarkId::RightWrist, lm(0.40, 0.04))
        .with(LandmarkId::LeftWrist, lm(0.60 + left_offset, 0.04))
}

pub fn press_top() -> LandmarkFrame {
    press_top_with(0.0)
}

/// 側面フレーム。`lean` 度だけ上体を前傾、右肘角度 `elbow` で前腕を前に上げる
pub fn profile(lean: f32, elbow: f32) -> LandmarkFrame {
    let dx = 0.3 * lean.to_radians().tan();
    let a = elbow.to_radians();
    let elbow_pt = [0.50 + dx, 0.45];
    LandmarkFrame::new()
        .with(LandmarkId::Nose, lm(0.52 + dx, 0.15))
        .with(LandmarkId::RightShoulder, lm(0.50 + dx, 0.30))
        .with(LandmarkId::LeftShoulder, lm(0.51 + dx, 0.30))
        .with(LandmarkId::RightHip, lm(0.50, 0.60))
        .with(LandmarkId::LeftHip, lm(0.51, 0.60))
        .with(LandmarkId::RightElbow, lm(elbow_pt[0], elbow_pt[1]))
        .with(
            LandmarkId::RightWrist,
            lm(elbow_pt[0] + FOREARM * a.sin(), elbow_pt[1] - FOREARM * a.cos()),
        )
}

/// プレスの側面フレーム。`forward` なら肘が体の前に出ている
pub fn press_profile(forward: bool) -> LandmarkFrame {
    let elbow = if forward { [0.60, 0.35] } else { [0.505, 0.42] };
    LandmarkFrame::new()
        .with(LandmarkId::Nose, lm(0.52, 0.15))
        .with(LandmarkId::RightShoulder, lm(0.50, 0.30))
        .with(LandmarkId::LeftShoulder, lm(0.51, 0.30))
        .with(LandmarkId::RightHip, lm(0.50, 0.60))
        .with(LandmarkId::LeftHip, lm(0.51, 0.60))
        .with(LandmarkId::RightElbow, lm(elbow[0], elbow[1]))
        .with(LandmarkId::RightWrist, lm(elbow[0], elbow[1] - 0.13))
}

/// `side` の腕（肘と手首）を肩まわりに `deg` 度、体の外側へ回転させる
///
/// 肘角度は変わらず、上腕の鉛直からのずれが `deg` になる。
pub fn tilt_arm(mut frame: LandmarkFrame, side: Side, deg: f32) -> LandmarkFrame {
    let (shoulder, elbow, wrist, outward) = match side {
        Side::Right => (LandmarkId::RightShoulder, LandmarkId::RightElbow, LandmarkId::RightWrist, -1.0),
        Side::Left => (LandmarkId::LeftShoulder, LandmarkId::LeftElbow, LandmarkId::LeftWrist, 1.0),
    };
    let s = frame.point(shoulder);
    let t = (outward * deg).to_radians();
    let (sin, cos) = (-t.sin(), t.cos());
    for id in [elbow, wrist] {
        let p = frame.point(id);
        let (dx, dy) = (p[0] - s[0], p[1] - s[1]);
        let rotated = [s[0] + dx * cos - dy * sin, s[1] + dx * sin + dy * cos];
        frame.set(id, lm(rotated[0], rotated[1]));
    }
    frame
}
