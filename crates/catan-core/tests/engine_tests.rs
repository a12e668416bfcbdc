//! Integration tests for the rules engine: complete flows from setup through
//! MAIN-phase turns, plus the cross-cutting invariants every reachable state
//! must satisfy.

use catan_core::*;

/// Play out the whole setup phase, choosing the first legal spot each step.
fn complete_setup(mut game: GameState) -> GameState {
    let mut guard = 0;
    while let GamePhase::Setup {
        setup_order,
        setup_step,
        setup_sub_phase,
        last_settlement_vertex,
    } = game.phase.clone()
    {
        assert!(guard < 64, "setup should finish in 2 placements per seat");
        guard += 1;

        let actor = setup_order[setup_step];
        match setup_sub_phase {
            SetupPlacing::PlaceSettlement => {
                let vertex = first_legal_settlement(&game, actor);
                game = game
                    .dispatch(actor, &PlayerAction::PlaceSettlement { vertex })
                    .expect("a legal settlement spot always exists during setup");
            }
            SetupPlacing::PlaceRoad => {
                let settlement = last_settlement_vertex.expect("road follows settlement");
                let edge = settlement
                    .touching_edges()
                    .into_iter()
                    .find(|edge| {
                        game.validate_action(actor, &PlayerAction::PlaceRoad { edge: *edge })
                            .is_ok()
                    })
                    .expect("a settlement always has a free land edge");
                game = game
                    .dispatch(actor, &PlayerAction::PlaceRoad { edge })
                    .unwrap();
            }
        }
    }
    game
}

fn first_legal_settlement(game: &GameState, actor: PlayerId) -> VertexCoord {
    let mut vertices: Vec<VertexCoord> = layout::layout().land_vertices().copied().collect();
    vertices.sort();
    vertices
        .into_iter()
        .find(|vertex| {
            game.validate_action(actor, &PlayerAction::PlaceSettlement { vertex: *vertex })
                .is_ok()
        })
        .expect("some vertex must be legal")
}

/// Drive one seat's obligation forward with the first legal move for the
/// current sub-phase. Returns the successor state.
fn step_main(game: GameState) -> GameState {
    let GamePhase::Main { main_sub_phase } = game.phase else {
        return game;
    };
    match main_sub_phase {
        MainSubPhase::RollDice => game
            .dispatch(game.current_player, &PlayerAction::RollDice)
            .unwrap(),
        MainSubPhase::Discard => {
            let (&debtor, &owed) = game
                .pending_discards
                .iter()
                .min_by_key(|(&player, _)| player)
                .unwrap();
            let mut discard = ResourceBundle::new();
            let mut remaining = owed;
            for resource in Resource::ALL {
                let take = game.player(debtor).resources.get(resource).min(remaining);
                discard.add(resource, take);
                remaining -= take;
            }
            game.dispatch(debtor, &PlayerAction::DiscardResources { resources: discard })
                .unwrap()
        }
        MainSubPhase::MoveRobber => {
            let hex = layout::LAND_HEXES
                .into_iter()
                .find(|&h| h != game.board.robber())
                .unwrap();
            game.dispatch(game.current_player, &PlayerAction::MoveRobber { hex })
                .unwrap()
        }
        MainSubPhase::Steal => {
            let target = game.must_steal_from[0];
            game.dispatch(
                game.current_player,
                &PlayerAction::Steal {
                    target_player_id: target,
                },
            )
            .unwrap()
        }
        MainSubPhase::TradeBuildPlay => game
            .dispatch(game.current_player, &PlayerAction::EndTurn)
            .unwrap(),
    }
}

/// Cross-cutting invariants that must hold in every reachable state.
fn assert_invariants(game: &GameState) {
    // Supply conservation: players + bank always total 19 per resource.
    let held: u32 = game.players.iter().map(|p| p.resources.total()).sum();
    assert_eq!(held + game.bank.resources().total(), 95);

    // Dev cards in play plus the deck always total 25.
    let cards: usize = game.players.iter().map(|p| p.dev_cards.len()).sum();
    assert_eq!(cards + game.dev_deck.len(), 25);

    // Distance rule on every built vertex.
    for (vertex, _) in game.board.buildings() {
        for adjacent in vertex.adjacent_vertices() {
            assert!(
                game.board.building(&adjacent).is_none(),
                "buildings at {vertex} and {adjacent} violate the distance rule"
            );
        }
    }

    // At most one holder of each bonus.
    assert!(game.players.iter().filter(|p| p.has_longest_road).count() <= 1);
    assert!(game.players.iter().filter(|p| p.has_largest_army).count() <= 1);

    // The robber is always on a board hex.
    assert!(game.board.tile(&game.board.robber()).is_some());
}

#[test]
fn setup_completes_with_snake_order_and_starting_resources() {
    let game = GameState::new(
        "setup",
        vec!["Alice".into(), "Bob".into(), "Charlie".into(), "Diana".into()],
        42,
    );
    let game = complete_setup(game);

    assert!(matches!(
        game.phase,
        GamePhase::Main {
            main_sub_phase: MainSubPhase::RollDice
        }
    ));
    assert_eq!(game.turn_number, 1);
    assert_eq!(game.current_player, 0, "setup snake ends where it began");

    for player in &game.players {
        assert_eq!(player.settlements_remaining, 3, "two settlements placed");
        assert_eq!(player.roads_remaining, 13, "two roads placed");
        assert!(
            player.resources.total() <= 3,
            "starting resources come from one settlement's 1-3 hexes"
        );
    }
    assert_invariants(&game);
}

#[test]
fn setup_settlement_distance_rule_scenario() {
    // Board seed 0; seat 0 claims the north pole of the center hex.
    let game = GameState::new("distance", vec!["P1".into(), "P2".into(), "P3".into()], 0);
    let center_north = HexCoord::new(0, 0).vertex(VertexDirection::N);

    let game = game
        .dispatch(0, &PlayerAction::PlaceSettlement { vertex: center_north })
        .unwrap();
    let road = center_north
        .touching_edges()
        .into_iter()
        .find(|edge| {
            game.validate_action(0, &PlayerAction::PlaceRoad { edge: *edge })
                .is_ok()
        })
        .unwrap();
    let game = game.dispatch(0, &PlayerAction::PlaceRoad { edge: road }).unwrap();

    // One edge away: rejected, and the reason names the distance rule.
    let adjacent: VertexCoord =
        serde_json::from_str(r#"{"q":1,"r":-1,"s":0,"dir":"S"}"#).unwrap();
    let err = game
        .dispatch(1, &PlayerAction::PlaceSettlement { vertex: adjacent })
        .unwrap_err();
    assert!(err.to_string().contains("distance rule"), "got: {err}");

    // Two edges away: accepted.
    let two_away: VertexCoord =
        serde_json::from_str(r#"{"q":1,"r":0,"s":-1,"dir":"N"}"#).unwrap();
    game.dispatch(1, &PlayerAction::PlaceSettlement { vertex: two_away })
        .unwrap();
}

#[test]
fn turns_flow_through_roll_robber_and_end() {
    let game = GameState::new("flow", vec!["Alice".into(), "Bob".into()], 7);
    let mut game = complete_setup(game);

    // Walk a handful of turns through whatever the dice demand.
    for _ in 0..40 {
        if game.is_finished() {
            break;
        }
        game = step_main(game);
        assert_invariants(&game);
    }

    assert!(
        game.turn_number > 1,
        "several turns should have completed, got {}",
        game.turn_number
    );
}

#[test]
fn dispatch_replay_is_bit_identical() {
    // Same seed, same action script: every intermediate state matches.
    let script = |mut game: GameState| {
        let mut states = vec![game.clone()];
        game = complete_setup(game);
        states.push(game.clone());
        for _ in 0..12 {
            if game.is_finished() {
                break;
            }
            game = step_main(game);
            states.push(game.clone());
        }
        states
    };

    let a = script(GameState::new("replay", vec!["A".into(), "B".into(), "C".into()], 99));
    let b = script(GameState::new("replay", vec!["A".into(), "B".into(), "C".into()], 99));

    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x, y);
    }
}

#[test]
fn seven_roll_obligations_block_until_discharged() {
    let game = GameState::new("seven", vec!["Alice".into(), "Bob".into()], 5);
    let mut game = complete_setup(game);

    let mut rolls = 0;
    loop {
        assert!(rolls < 200, "a 7 should come up eventually");
        rolls += 1;
        // Hold Bob at exactly 8 cards and Alice at none, so a 7 obliges Bob
        // alone to discard half, rounded down.
        game.players[0].resources = ResourceBundle::new();
        game.players[1].resources = ResourceBundle::with_amounts(3, 3, 2, 0, 0);

        let rolled = game
            .dispatch(game.current_player, &PlayerAction::RollDice)
            .unwrap();
        let (d1, d2) = rolled.dice_roll.unwrap();
        if d1 + d2 == 7 {
            game = rolled;
            break;
        }
        // Unwind the rest of the turn and try again.
        let mut turn = rolled;
        while !matches!(
            turn.phase,
            GamePhase::Main {
                main_sub_phase: MainSubPhase::RollDice
            }
        ) {
            turn = step_main(turn);
        }
        game = turn;
    }

    assert_eq!(game.pending_discards.get(&1), Some(&4));

    // Short discards bounce; the robber cannot move early.
    let short = ResourceBundle::with_amounts(3, 0, 0, 0, 0);
    assert_eq!(
        game.dispatch(1, &PlayerAction::DiscardResources { resources: short }),
        Err(RuleError::WrongDiscardCount(4))
    );
    let hex = layout::LAND_HEXES
        .into_iter()
        .find(|&h| h != game.board.robber())
        .unwrap();
    assert_eq!(
        game.dispatch(game.current_player, &PlayerAction::MoveRobber { hex }),
        Err(RuleError::WrongPhase)
    );

    // The exact amount clears the obligation and opens the robber move.
    let exact = ResourceBundle::with_amounts(2, 2, 0, 0, 0);
    let game = game
        .dispatch(1, &PlayerAction::DiscardResources { resources: exact })
        .unwrap();
    assert!(game.pending_discards.is_empty());
    assert!(matches!(
        game.phase,
        GamePhase::Main {
            main_sub_phase: MainSubPhase::MoveRobber
        }
    ));
}

#[test]
fn proposing_then_cancelling_a_trade_changes_no_hands() {
    let game = GameState::new("trade", vec!["Alice".into(), "Bob".into()], 21);
    let mut game = complete_setup(game);

    // Get to the build phase of whoever's turn it is.
    while !matches!(
        game.phase,
        GamePhase::Main {
            main_sub_phase: MainSubPhase::TradeBuildPlay
        }
    ) {
        game = step_main(game);
    }

    let actor = game.current_player;
    game.players[actor as usize].resources = ResourceBundle::with_amounts(2, 1, 0, 0, 0);
    let hands: Vec<ResourceBundle> = game.players.iter().map(|p| p.resources).collect();

    let proposed = game
        .dispatch(
            actor,
            &PlayerAction::ProposeTrade {
                offering: ResourceBundle::single(Resource::Wood, 2),
                requesting: ResourceBundle::single(Resource::Ore, 1),
            },
        )
        .unwrap();
    let trade_id = proposed.trades[0].id;
    let cancelled = proposed
        .dispatch(actor, &PlayerAction::CancelTrade { trade_id })
        .unwrap();

    let after: Vec<ResourceBundle> = cancelled.players.iter().map(|p| p.resources).collect();
    assert_eq!(hands, after, "cancelled trades move nothing");
    assert!(!cancelled.trades[0].is_open());
}

#[test]
fn views_round_trip_and_hide_rival_hands() {
    let game = GameState::new("views", vec!["Alice".into(), "Bob".into()], 3);
    let mut game = complete_setup(game);
    game = step_main(game);

    for viewer in 0..2u8 {
        let view = GameView::for_player(&game, viewer);
        let json = serde_json::to_string(&view).unwrap();
        let back: GameView = serde_json::from_str(&json).unwrap();
        assert_eq!(back.you, viewer);
        assert_eq!(back.players.len(), 2);

        for player in &back.players {
            if player.id == viewer {
                assert!(player.resources.is_some());
            } else {
                assert!(player.resources.is_none());
            }
        }
    }
}
