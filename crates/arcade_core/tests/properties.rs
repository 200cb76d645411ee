//! Property-based tests for collision and replay invariants.

use arcade_core::collision::{self, MotionConfig};
use arcade_core::prelude::*;
use arcade_test_utils::determinism::record_and_replay;
use arcade_test_utils::determinism::strategies::{arb_rect, arb_script};
use arcade_test_utils::fixtures::{block, fixed, ScriptedInput};
use proptest::prelude::*;

proptest! {
    #[test]
    fn overlap_is_symmetric(a in arb_rect(), b in arb_rect()) {
        prop_assert_eq!(a.intersects(&b), b.intersects(&a));
    }

    #[test]
    fn movers_never_pass_through_walls(
        start in 0i32..100,
        size in 1i32..60,
        gap in 0i32..300,
        thickness in 1i32..5,
        speed in 1i32..800,
        step in 1i32..8,
    ) {
        let mut registry = ObjectRegistry::new();
        let wall_x = start + size + gap;
        registry.add(block(wall_x, 0, thickness, 100)).unwrap();

        let config = MotionConfig { step_unit: fixed(step), bounds: None };
        let mover = Rect::from_ints(start, 10, size, size);
        let result = collision::resolve_motion(
            &registry,
            &mover,
            None,
            Vec2Fixed::from_ints(speed, 0),
            &config,
        );

        prop_assert!(result.bounds.right() <= fixed(wall_x));
        prop_assert!(!collision::is_blocked(&registry, &result.bounds, None));
        if speed >= gap {
            prop_assert_eq!(result.bounds.right(), fixed(wall_x));
            prop_assert!(result.blocked_x || speed == gap);
        } else {
            prop_assert_eq!(result.bounds.x, fixed(start + speed));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn random_sessions_replay_faithfully(script in arb_script(60, 12)) {
        let mut game = Game::Platformer.with_scene(EngineConfig::default()).unwrap();
        let mut full = vec![ScriptedInput::new(0, 1, Input::Join)];
        full.extend(script);
        let check = record_and_replay(&mut game, &full, 80, PlaybackRate::Normal);
        prop_assert!(check.is_faithful(), "diverged at {:?}", check.first_divergence());
    }
}
