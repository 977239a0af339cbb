//! Level session tests: kills, triggers, dialogue holds and progression

#[cfg(test)]
mod tests {
    use apologise_core::actor::RosterSlot;
    use apologise_core::config::{AiKind, EngineConfig, EntryPolicy};
    use apologise_core::protocol::{ActorPhase, LevelState, Rank, RunOutcome, SoundCue};
    use apologise_core::{Direction, Intent, Level, LevelCatalog, LevelEvent, Vec2};

    fn fast_config() -> EngineConfig {
        EngineConfig {
            transition_steps: 3,
            run_time_steps: 5,
            ..EngineConfig::default()
        }
    }

    fn session(json: &str, config: EngineConfig) -> Level {
        let catalog = LevelCatalog::from_json_str(json, &config.world).unwrap();
        Level::new(catalog, config).unwrap()
    }

    /// Step `n` times and collect every event raised.
    fn run(level: &mut Level, n: usize) -> Vec<LevelEvent> {
        (0..n).flat_map(|_| level.step().events).collect()
    }

    fn kills_in(events: &[LevelEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, LevelEvent::ActorKilled { .. }))
            .count()
    }

    /// Two actors inside the hazard radius of the start, one far away.
    const CROWDED_START: &str = r#"[{
        "start": [70, 485],
        "entrance": [[0, 0], [0, 500]],
        "exit": [[1000, 0], [1000, 500]],
        "actors": [
            { "position": [120, 485], "facing": "right", "ai": "walk" },
            { "position": [150, 485], "facing": "left", "ai": "walk" },
            { "position": [800, 485], "facing": "right", "ai": "walk" }
        ]
    }]"#;

    // -----------------------------------------------------------------------
    // Kills
    // -----------------------------------------------------------------------

    #[test]
    fn actors_in_hazard_radius_die() {
        let mut level = session(CROWDED_START, fast_config());
        let events = run(&mut level, 5);

        assert_eq!(kills_in(&events), 2);
        assert_eq!(level.kills(), 2);
        assert!(events.contains(&LevelEvent::Sound { cue: SoundCue::Die }));

        let dead = level
            .roster()
            .iter()
            .filter(|slot| matches!(slot, RosterSlot::Dead(_)))
            .count();
        assert_eq!(dead, 2);
    }

    #[test]
    fn survivors_flee_then_calm_down() {
        let mut level = session(CROWDED_START, fast_config());
        for _ in 0..5 {
            level.step();
            if level.kills() == 2 {
                break;
            }
        }

        let survivor = level
            .roster()
            .iter()
            .find_map(RosterSlot::as_alive)
            .unwrap();
        assert_eq!(survivor.ai().kind, AiKind::RunAway);
        assert!(level.run_timer() > 0);

        run(&mut level, 10);
        let survivor = level
            .roster()
            .iter()
            .find_map(RosterSlot::as_alive)
            .unwrap();
        assert_eq!(survivor.ai().kind, AiKind::Walk);
        assert_eq!(level.run_timer(), 0);
    }

    #[test]
    fn corpses_come_to_rest() {
        let mut level = session(CROWDED_START, fast_config());
        run(&mut level, 300);

        let phases: Vec<ActorPhase> = level
            .snapshot()
            .actors
            .iter()
            .filter(|a| a.facing.is_none())
            .map(|a| a.phase)
            .collect();
        assert_eq!(phases, vec![ActorPhase::AtRest, ActorPhase::AtRest]);
    }

    // -----------------------------------------------------------------------
    // Win & run outcome
    // -----------------------------------------------------------------------

    #[test]
    fn won_trigger_completes_the_run() {
        let json = r#"[{
            "start": [70, 485],
            "entrance": [[0, 0], [0, 500]],
            "exit": [[1000, 0], [1000, 500]],
            "actors": [
                { "position": [120, 485], "facing": "right", "ai": "walk" },
                { "position": [150, 485], "facing": "left", "ai": "walk" },
                { "position": [800, 485], "facing": "right", "ai": "walk" }
            ],
            "triggers": [{
                "region": [[0, 400], [200, 400], [200, 499], [0, 499]],
                "actions": [{ "type": "set_won" }]
            }]
        }]"#;
        let mut config = fast_config();
        config.ranks.low = 15;
        config.ranks.high = 16;
        let mut level = session(json, config);

        let mut events = Vec::new();
        for _ in 0..20 {
            events.extend(level.step().events);
            if level.run_outcome().is_some() {
                break;
            }
        }

        assert_eq!(kills_in(&events), 2);
        assert!(events.contains(&LevelEvent::LevelWon));
        assert!(events.contains(&LevelEvent::TransitionStarted));
        let expected = RunOutcome {
            rank: Rank::Best,
            total_kills: 2,
        };
        assert!(events.contains(&LevelEvent::RunCompleted { outcome: expected }));
        assert_eq!(level.state(), LevelState::RunComplete);
        assert_eq!(level.snapshot().run_outcome, Some(expected));

        // held until dismissed
        let report = level.step();
        assert!(!report.simulated);
        assert_eq!(report.state, LevelState::RunComplete);

        level.apply(Intent::AdvanceDialogue);
        assert_eq!(level.state(), LevelState::Playing);
        assert_eq!(level.level_index(), 0);
        assert_eq!(level.total_kills(), 0);
        assert_eq!(level.kills(), 0);
        assert_eq!(level.active_triggers(), 1);
    }

    /// The exit crosses the start; the first level has an end line.
    const DOOR_AT_START: &str = r#"[
        {
            "start": [70, 485],
            "entrance": [[0, 0], [0, 500]],
            "exit": [[75, 400], [75, 500]],
            "dialogue": [null, "Bye."]
        },
        {
            "start": [500, 485],
            "entrance": [[0, 0], [0, 500]],
            "exit": [[1000, 0], [1000, 500]]
        }
    ]"#;

    #[test]
    fn door_win_waits_for_end_line() {
        let mut level = session(DOOR_AT_START, fast_config());

        let first = level.step();
        assert!(first.events.contains(&LevelEvent::LevelWon));
        assert_eq!(first.sounds().collect::<Vec<_>>(), vec![SoundCue::Win]);

        let events = run(&mut level, 10);
        assert!(!events.contains(&LevelEvent::TransitionStarted));
        assert_eq!(level.state(), LevelState::WonPendingDialogue);
        assert_eq!(level.transition_remaining(), None);

        let dialogue = level.snapshot().dialogue.unwrap();
        assert_eq!(dialogue.lines, vec!["Bye.".to_string()]);
        assert!(dialogue.more);

        level.apply(Intent::AdvanceDialogue);
        assert_eq!(level.state(), LevelState::Transitioning);

        let events = run(&mut level, 3);
        assert_eq!(events.first(), Some(&LevelEvent::TransitionStarted));
        assert!(events.contains(&LevelEvent::LevelAdvanced { index: 1 }));
        assert_eq!(level.level_index(), 1);
        assert_eq!(level.state(), LevelState::Playing);
        assert_eq!(level.snapshot().player.position, Vec2::new(500.0, 485.0));
    }

    #[test]
    fn reset_ignored_once_won() {
        let mut level = session(DOOR_AT_START, fast_config());
        run(&mut level, 2);
        assert_eq!(level.state(), LevelState::WonPendingDialogue);
        assert!(!level.reset());

        level.apply(Intent::AdvanceDialogue);
        level.step();
        let remaining = level.transition_remaining();
        assert!(remaining.is_some());

        level.apply(Intent::Reset);
        assert_eq!(level.state(), LevelState::Transitioning);
        assert_eq!(level.transition_remaining(), remaining);
        assert!(level.is_won());
    }

    #[test]
    fn reset_while_playing_restores_start() {
        let mut level = session(CROWDED_START, fast_config());
        run(&mut level, 5);
        assert_eq!(level.kills(), 2);

        assert!(level.reset());
        assert_eq!(level.kills(), 0);
        assert!(level
            .roster()
            .iter()
            .all(|slot| matches!(slot, RosterSlot::Alive(_))));
        assert_eq!(level.snapshot().player.position, Vec2::new(70.0, 485.0));
    }

    #[test]
    fn carry_through_places_player_at_entrance() {
        let config = EngineConfig {
            entry: EntryPolicy::CarryThroughEntrance,
            ..fast_config()
        };
        let mut level = session(DOOR_AT_START, config);
        run(&mut level, 2);
        level.apply(Intent::AdvanceDialogue);
        run(&mut level, 3);

        assert_eq!(level.level_index(), 1);
        // (70, 485) relative to the exit's lower end, mirrored across x = 0
        let p = level.snapshot().player.position;
        assert!((p.x - 5.0).abs() < 3.0, "x = {}", p.x);
        assert!((p.y - 485.0).abs() < 3.0, "y = {}", p.y);
    }

    // -----------------------------------------------------------------------
    // Dialogue & triggers
    // -----------------------------------------------------------------------

    #[test]
    fn opening_dialogue_holds_physics() {
        let json = r#"[{
            "start": [500, 300],
            "entrance": [[0, 0], [0, 500]],
            "exit": [[1000, 0], [1000, 500]],
            "dialogue": ["one", "two", null]
        }]"#;
        let mut level = session(json, fast_config());

        level.apply(Intent::Move {
            direction: Direction::Right,
        });
        let report = level.step();
        assert!(!report.simulated);
        assert!(level.player().intents().is_empty());
        assert_eq!(level.snapshot().player.position, Vec2::new(500.0, 300.0));

        level.apply(Intent::AdvanceDialogue);
        let dialogue = level.snapshot().dialogue.unwrap();
        assert_eq!(dialogue.lines, vec!["one".to_string(), "two".to_string()]);
        assert!(!dialogue.more);

        let report = level.step();
        assert!(report.simulated);
        assert!(level.snapshot().player.position.y > 300.0);
    }

    #[test]
    fn trigger_fires_once_and_reveals_geometry() {
        let json = r#"[{
            "start": [70, 485],
            "entrance": [[0, 0], [0, 500]],
            "exit": [[1000, 0], [1000, 500]],
            "dialogue": ["Only line", null],
            "geometry": [
                { "points": [[300, 400], [340, 400], [340, 420], [300, 420]], "removable": true }
            ],
            "triggers": [{
                "region": [[0, 400], [200, 400], [200, 499], [0, 499]],
                "actions": [
                    { "type": "extend_dialogue", "line": 0, "text": "..." },
                    { "type": "reveal_geometry", "geometry": [[500, 400], [540, 400], [540, 420], [500, 420]] },
                    { "type": "custom", "id": 7 }
                ]
            }]
        }]"#;
        let mut level = session(json, fast_config());
        assert!(level.snapshot().geometry.is_empty());
        assert_eq!(level.active_triggers(), 1);

        let events = run(&mut level, 10);
        let customs = events
            .iter()
            .filter(|e| matches!(e, LevelEvent::Custom { id: 7 }))
            .count();
        assert_eq!(customs, 1);
        assert_eq!(level.active_triggers(), 0);

        let snapshot = level.snapshot();
        assert_eq!(snapshot.geometry.len(), 1);
        assert_eq!(snapshot.dialogue.unwrap().lines, vec!["Only line...".to_string()]);
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    #[test]
    fn snapshot_serialises_for_the_host() {
        let mut level = session(CROWDED_START, fast_config());
        let report = level.step();
        assert_eq!(report.frame, 1);

        let json = serde_json::to_value(level.snapshot()).unwrap();
        assert_eq!(json["state"], "playing");
        assert_eq!(json["level_index"], 0);
        assert_eq!(json["actors"].as_array().unwrap().len(), 3);
        assert!(json.get("dialogue").is_none());
        assert!(json.get("transition").is_none());
    }
}
