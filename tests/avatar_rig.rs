use avatar_rig_wasm::{Avatar, BoneTree, RigConfig, RigError, Side, Skeleton, Vec3};
use wasm_bindgen_test::*;

const MIXAMO: &str = include_str!("fixtures/mixamo_skeleton.json");

fn processed(json: &str) -> Avatar<Skeleton> {
    let mut avatar = Avatar::new(Skeleton::from_json(json).unwrap(), RigConfig::default());
    avatar.process_bones();
    avatar
}

fn index(avatar: &Avatar<Skeleton>, name: &str) -> usize {
    avatar
        .tree()
        .bone_index_by_name(&format!("mixamorig:{name}"))
        .unwrap()
}

#[test]
#[wasm_bindgen_test]
fn test_named_skeleton_is_fully_classified() {
    let avatar = processed(MIXAMO);
    let body = avatar.body();
    let bone = |name: &str| index(&avatar, name);

    assert!(body.processed);
    assert_eq!(body.hips, Some(bone("Hips")));
    assert_eq!(body.spine, vec![bone("Spine"), bone("Spine1")]);
    assert_eq!(body.neck, Some(bone("Neck")));
    assert_eq!(body.head, Some(bone("Head")));

    for (arm, prefix) in [(&body.left_arm, "Left"), (&body.right_arm, "Right")] {
        assert_eq!(arm.shoulder, Some(index(&avatar, &format!("{prefix}Shoulder"))));
        assert_eq!(arm.upper, Some(index(&avatar, &format!("{prefix}Arm"))));
        assert_eq!(arm.lower, Some(index(&avatar, &format!("{prefix}ForeArm"))));
        assert_eq!(arm.hand, Some(index(&avatar, &format!("{prefix}Hand"))));
        assert!((arm.lengths.length - 0.5).abs() < 1e-5);
    }
    assert_eq!(
        body.left_arm.fingers.index,
        vec![bone("LeftHandIndex1"), bone("LeftHandIndex2")]
    );
    assert_eq!(body.left_arm.fingers.thumb, vec![bone("LeftHandThumb1")]);

    for (leg, prefix) in [(&body.left_leg, "Left"), (&body.right_leg, "Right")] {
        assert_eq!(leg.upper, Some(index(&avatar, &format!("{prefix}UpLeg"))));
        assert_eq!(leg.lower, Some(index(&avatar, &format!("{prefix}Leg"))));
        assert_eq!(leg.foot.first().copied(), Some(index(&avatar, &format!("{prefix}Foot"))));
    }

    assert!(body.head_rig.is_some());
    assert!(body.unprocessed.is_empty(), "{:?}", body.unprocessed);
}

#[test]
#[wasm_bindgen_test]
fn test_classification_is_idempotent() {
    let mut avatar = processed(MIXAMO);
    let first = avatar.body().clone();

    avatar
        .reach_for(Side::Right, Vec3::new(-0.2, 1.3, 0.3), None)
        .unwrap();
    avatar.crouch(0.25).unwrap();

    let second = avatar.process_bones().clone();
    assert_eq!(first, second);
}

#[test]
#[wasm_bindgen_test]
fn test_moved_and_turned_avatar_reaches_world_target() {
    let json = MIXAMO.replacen(
        "\"bones\"",
        "\"root\": { \"position\": [3, 0, -2], \"rotation\": [0, 0.7071068, 0, 0.7071068] }, \"bones\"",
        1,
    );
    let mut avatar = processed(&json);
    let hand = index(&avatar, "LeftHand");

    // in front of the left shoulder, in the avatar's own frame
    let shoulder = avatar.tree().world_position(index(&avatar, "LeftArm"));
    let forward = avatar.tree().root().to_world_direction(Vec3::Z);
    let target = shoulder + forward * 0.4 + Vec3::new(0.0, -0.1, 0.0);

    avatar.reach_for(Side::Left, target, None).unwrap();
    let reached = avatar.tree().world_position(hand);
    assert!(reached.distance(target) < 1e-3, "{:?} != {:?}", reached, target);
}

#[test]
#[wasm_bindgen_test]
fn test_bend_arm_reports_overreach() {
    let mut avatar = processed(MIXAMO);
    assert_eq!(avatar.bend_arm(Side::Left, 0.3).unwrap(), Some(true));
    assert_eq!(avatar.bend_arm(Side::Left, 2.0).unwrap(), Some(false));
}

#[test]
#[wasm_bindgen_test]
fn test_head_follows_target_and_survives_degenerate_gaze() {
    let mut avatar = processed(MIXAMO);
    let head = avatar.body().head.unwrap();

    let eye = avatar.head_pos().unwrap();
    avatar.look_at(eye + Vec3::new(-1.0, 0.3, 2.0)).unwrap();
    let facing = avatar.tree().world_rotation(head) * Vec3::Z;
    assert!(facing.x < 0.0 && facing.y > 0.0 && facing.z > 0.0);

    avatar.look_at(avatar.head_pos().unwrap()).unwrap();
    assert!(avatar.tree().local_rotation(head).is_finite());
}

#[test]
#[wasm_bindgen_test]
fn test_unclassified_rig_rejects_solving() {
    let mut avatar = Avatar::new(Skeleton::from_json(MIXAMO).unwrap(), RigConfig::default());
    assert!(matches!(avatar.look_at(Vec3::Z), Err(RigError::NotClassified)));
}
