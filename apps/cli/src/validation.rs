//! 输入验证
//!
//! 数值解析由 `nova-protocol` 的 `FromStr` 完成，这里额外拒绝 NaN/Inf。

use anyhow::{Context, Result, bail};
use nova_protocol::{JointTarget, Pose};

fn ensure_finite(values: &[f64; 6], what: &str) -> Result<()> {
    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        bail!("{} value #{} is not finite", what, i + 1);
    }
    Ok(())
}

/// 位姿：`x,y,z,rx,ry,rz`（mm / 度）
pub fn parse_pose(input: &str) -> Result<Pose> {
    let pose: Pose = input
        .parse()
        .with_context(|| format!("invalid pose {:?}", input))?;
    ensure_finite(&[pose.x, pose.y, pose.z, pose.rx, pose.ry, pose.rz], "pose")?;
    Ok(pose)
}

/// 关节角：`j1,...,j6`（度）
pub fn parse_joints(input: &str) -> Result<[f64; 6]> {
    let joints: JointTarget = input
        .parse()
        .with_context(|| format!("invalid joints {:?}", input))?;
    ensure_finite(joints.as_array(), "joints")?;
    Ok(joints.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pose() {
        let pose = parse_pose("-350, 0, 200, 180, 0, 0").unwrap();
        assert_eq!(pose, Pose::new(-350.0, 0.0, 200.0, 180.0, 0.0, 0.0));
    }

    #[test]
    fn test_parse_pose_errors() {
        assert!(parse_pose("1,2,3").is_err());
        assert!(parse_pose("1,2,3,4,5,6,7").is_err());
        assert!(parse_pose("1,2,x,4,5,6").is_err());
        assert!(parse_pose("1,2,inf,4,5,6").is_err());
    }

    #[test]
    fn test_parse_joints() {
        assert_eq!(
            parse_joints("0,45,45,0,90,0").unwrap(),
            [0.0, 45.0, 45.0, 0.0, 90.0, 0.0]
        );
        let err = parse_joints("0,45").unwrap_err();
        assert!(format!("{:#}", err).contains("expected 6 values, got 2"));
    }
}
