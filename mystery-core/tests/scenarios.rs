//! Scripted play-throughs of the sample case against the mock backend.

use invoke::Role;
use mystery_core::dialogue::DialoguePhase;
use mystery_core::regions::Viewport;
use mystery_core::session::{MapClick, Screen, ScreenClick};
use mystery_core::testing::{
    assert_context_contains_once, assert_context_lacks, assert_last_message, assert_not_obtained,
    assert_obtained, assert_stand, sample_game_data,
};
use mystery_core::{
    ActorId, MergeOutcome, MockReply, Notice, SessionError, StandVariant, TestHarness,
};

const MEDICINE: &str = "I bought sleeping medicine in town.";
const LIGHT: &str = "I saw a light in the library at midnight.";
const SWORD: &str = "The sword on the wall belonged to my family.";
const BODY: &str = "I moved the body to protect my sister.";

fn screen() -> Viewport {
    Viewport::identity(1920.0, 1080.0)
}

// ============================================================================
// Presenting evidence
// ============================================================================

#[test]
fn test_receipt_unlocks_medicine_once() {
    let mut harness = TestHarness::new();
    let leia = harness.talk_to("Leia");

    let first = harness.present("09");
    assert_eq!(first.merge, Some(MergeOutcome::Appended));
    assert_eq!(first.stand, Some(StandVariant::Three));
    assert_context_contains_once(&harness.session, leia, MEDICINE);
    assert_stand(&harness.session, StandVariant::Three);
    assert_eq!(
        harness.session.stand_image().as_deref(),
        Some("character_stand/leia3.webp")
    );

    let second = harness.present("09");
    assert_eq!(second.merge, Some(MergeOutcome::AlreadyMerged));
    assert_context_contains_once(&harness.session, leia, MEDICINE);
}

#[test]
fn test_presentation_appends_exchange() {
    let mut harness = TestHarness::new();
    let leia = harness.talk_to("Leia");

    let outcome = harness.present("09");
    assert_eq!(
        outcome.reply.as_deref(),
        Some("That receipt proves nothing! ...I bought medicine, yes.")
    );

    let messages = &harness.session.actor(leia).unwrap().messages;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "(Present Receipt)");
    assert_last_message(
        &harness.session,
        leia,
        Role::Assistant,
        "That receipt proves nothing! ...I bought medicine, yes.",
    );
    assert_eq!(
        harness.session.phase(),
        DialoguePhase::DisplayingResponse(mystery_core::Reveal::Instant)
    );
}

#[test]
fn test_presentation_spends_an_action_and_closes_screen() {
    let mut harness = TestHarness::new();
    harness.talk_to("Anan");
    harness.session.open_evidence();

    // Anan has no reaction to the sword
    let outcome = harness.present("01");
    assert_eq!(outcome.reply, None);
    assert_eq!(outcome.stand, None);
    assert_eq!(harness.session.screen(), Screen::Dialogue);
    assert_eq!(harness.session.action_countdown(), 657);
    assert!(harness.session.current_actor().unwrap().messages.is_empty());
}

#[test]
fn test_flag_reaction_keeps_base_stand() {
    let mut harness = TestHarness::new();
    let leia = harness.talk_to("Leia");
    harness.present("09");
    let outcome = harness.present("01");
    assert_eq!(outcome.merge, None);
    assert_eq!(outcome.stand, Some(StandVariant::Base));
    assert_stand(&harness.session, StandVariant::Base);
    assert_context_contains_once(&harness.session, leia, MEDICINE);
}

#[test]
fn test_stand_follows_ledger_after_switching_actors() {
    let mut harness = TestHarness::new();
    harness.talk_to("Leia");
    harness.present("04");
    harness.present("01");
    assert_stand(&harness.session, StandVariant::Base);

    harness.talk_to("Anan");
    harness.talk_to("Leia");
    // the override is gone; the latest merged fragment decides
    assert_stand(&harness.session, StandVariant::Four);
}

#[test]
fn test_confession_waits_for_prerequisites() {
    let mut harness = TestHarness::new();
    let leia = harness.talk_to("Leia");

    let early = harness.present("08");
    assert_eq!(early.merge, Some(MergeOutcome::OutOfSequence));
    assert_context_lacks(&harness.session, leia, BODY);

    harness.present("02");
    harness.present("09");
    harness.present("04");
    let late = harness.present("08");
    assert_eq!(late.merge, Some(MergeOutcome::Appended));
    assert_stand(&harness.session, StandVariant::Last);

    let context = &harness.session.actor(leia).unwrap().ledger.context1;
    let positions: Vec<usize> = [LIGHT, MEDICINE, SWORD, BODY]
        .iter()
        .map(|text| context.find(text).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{context}");
}

#[test]
fn test_grant_takes_precedence_over_testimony_notice() {
    let mut harness = TestHarness::new();
    let leia = harness.talk_to("Leia");

    let outcome = harness.present("02");
    assert_eq!(outcome.merge, Some(MergeOutcome::Appended));
    assert_eq!(outcome.granted.as_deref(), Some("05"));
    assert_obtained(&harness.session, "05");
    assert_context_contains_once(&harness.session, leia, LIGHT);
    assert_eq!(
        harness.session.take_notices(),
        vec![Notice::EvidenceObtained {
            id: "05".to_string(),
            image: "05.png".to_string()
        }]
    );

    // granted only once
    let again = harness.present("02");
    assert_eq!(again.granted, None);
    assert!(harness.session.take_notices().is_empty());
}

#[test]
fn test_testimony_notice_without_grant() {
    let mut harness = TestHarness::new();
    let leia = harness.talk_to("Leia");
    harness.present("09");
    assert_eq!(
        harness.session.take_notices(),
        vec![Notice::TestimonyUpdated { actor: leia }]
    );
}

#[test]
fn test_present_unknown_evidence() {
    let mut harness = TestHarness::new();
    harness.talk_to("Leia");
    let result = harness.session.present("99");
    assert!(matches!(result, Err(SessionError::UnknownEvidence(_))));
    assert_eq!(harness.session.action_countdown(), 658);
}

// ============================================================================
// Chat
// ============================================================================

#[tokio::test]
async fn test_chat_sends_prefixed_line_and_ledger() {
    let mut harness = TestHarness::with_replies(vec![MockReply::say("I was in the hall.")]);
    let leia = harness.talk_to("Leia");
    harness.present("09");

    harness.say("  Where were you?  ").await.unwrap();

    let request = harness.backend.last_request().unwrap();
    assert_eq!(request.character_file_version, "test");
    assert_eq!(request.session_id, harness.session.session_id());
    assert!(request.actor.context1.contains(MEDICINE));
    let sent = &request.actor.messages[request.actor.messages.len() - 1];
    assert_eq!(sent.content, "Hiro: Where were you?");

    assert_last_message(&harness.session, leia, Role::Assistant, "I was in the hall.");
    assert_eq!(harness.session.action_countdown(), 656);
}

#[tokio::test]
async fn test_keyword_in_reply_grants_evidence() {
    let mut harness = TestHarness::with_replies(vec![
        MockReply::say("I keep everything in my notebook."),
        MockReply::say("Nothing else."),
    ]);
    harness.talk_to("Anan");

    harness.say("What do you write?").await.unwrap();
    assert_obtained(&harness.session, "06");
    assert_eq!(
        harness.session.take_notices(),
        vec![Notice::EvidenceObtained {
            id: "06".to_string(),
            image: "06.png".to_string()
        }]
    );

    harness.say("Anything else?").await.unwrap();
    assert!(harness.session.take_notices().is_empty());
}

#[tokio::test]
async fn test_keywords_only_apply_to_their_actor() {
    let mut harness = TestHarness::with_replies(vec![MockReply::say("Notebook? I have none.")]);
    harness.talk_to("Leia");
    harness.say("Do you keep a notebook?").await.unwrap();
    assert_not_obtained(&harness.session, "06");
}

#[tokio::test]
async fn test_empty_message_rejected() {
    let mut harness = TestHarness::new();
    let result = harness.session.send_message("   ").await;
    assert!(matches!(result, Err(SessionError::EmptyMessage)));
    assert!(harness.backend.requests().is_empty());
}

#[tokio::test]
async fn test_histories_are_per_actor() {
    let mut harness = TestHarness::with_replies(vec![
        MockReply::say("Leia here."),
        MockReply::say("Anan here."),
    ]);
    let leia = harness.talk_to("Leia");
    harness.say("Hello").await.unwrap();
    let anan = harness.talk_to("Anan");
    harness.say("Hello").await.unwrap();

    assert_last_message(&harness.session, leia, Role::Assistant, "Leia here.");
    assert_last_message(&harness.session, anan, Role::Assistant, "Anan here.");
    assert_eq!(harness.session.actor(anan).unwrap().messages.len(), 2);
}

// ============================================================================
// Evidence screen
// ============================================================================

#[test]
fn test_evidence_screen_select_and_present() {
    let mut harness = TestHarness::new();
    let leia = harness.talk_to("Leia");
    harness.give(&["09"]);
    harness.session.open_evidence();

    // the sword and crest are held from the start, so the receipt is third
    let click = harness.session.click_evidence_screen(&screen(), 500.0, 950.0).unwrap();
    assert_eq!(click, ScreenClick::Selected(Some("09".to_string())));
    assert_eq!(harness.session.selected_evidence().unwrap().name, "Receipt");

    let click = harness.session.click_evidence_screen(&screen(), 400.0, 700.0).unwrap();
    assert!(matches!(click, ScreenClick::Presented(_)));
    assert_eq!(harness.session.screen(), Screen::Dialogue);
    assert_context_contains_once(&harness.session, leia, MEDICINE);
}

#[test]
fn test_evidence_screen_inert_and_empty_clicks() {
    let mut harness = TestHarness::new();
    harness.session.open_evidence();

    // present with nothing selected
    let click = harness.session.click_evidence_screen(&screen(), 400.0, 700.0).unwrap();
    assert_eq!(click, ScreenClick::Inert);
    // an empty slot clears the selection
    let click = harness.session.click_evidence_screen(&screen(), 150.0, 950.0).unwrap();
    assert_eq!(click, ScreenClick::Selected(Some("01".to_string())));
    let click = harness.session.click_evidence_screen(&screen(), 850.0, 950.0).unwrap();
    assert_eq!(click, ScreenClick::Selected(None));
    assert!(harness.session.selected_evidence().is_none());
    // nowhere in particular
    let click = harness.session.click_evidence_screen(&screen(), 1000.0, 600.0).unwrap();
    assert_eq!(click, ScreenClick::Missed);

    let click = harness.session.click_evidence_screen(&screen(), 1800.0, 50.0).unwrap();
    assert_eq!(click, ScreenClick::Closed);
    assert_eq!(harness.session.screen(), Screen::Dialogue);
    assert_eq!(harness.session.action_countdown(), 658);
}

#[test]
fn test_evidence_screen_letterboxed_click() {
    let mut harness = TestHarness::new();
    harness.session.open_evidence();

    // the image drawn at half size, centred with 100px bars on each side
    let viewport = Viewport::new(1920.0, 1080.0, 1160.0, 540.0);
    let click = harness
        .session
        .click_evidence_screen(&viewport, 100.0 + 75.0, 475.0)
        .unwrap();
    assert_eq!(click, ScreenClick::Selected(Some("01".to_string())));

    let on_bar = harness.session.click_evidence_screen(&viewport, 50.0, 475.0).unwrap();
    assert_eq!(on_bar, ScreenClick::Missed);
}

#[test]
fn test_evidence_paging() {
    let mut harness = TestHarness::new();
    let all: Vec<String> = (1..=12).map(|n| format!("{n:02}")).collect();
    let ids: Vec<&str> = all.iter().map(String::as_str).collect();
    harness.give(&ids);
    harness.session.open_evidence();

    let names = |h: &TestHarness| -> Vec<Option<String>> {
        h.session
            .evidence_slots()
            .iter()
            .map(|slot| slot.map(|item| item.id.clone()))
            .collect()
    };

    let first = names(&harness);
    assert_eq!(first[0], None);
    assert_eq!(first[1].as_deref(), Some("01"));
    assert_eq!(first[10].as_deref(), Some("10"));
    assert_eq!(first[11], None);

    assert!(!harness.session.evidence_page_left());
    assert!(harness.session.evidence_page_right());
    assert!(harness.session.evidence_page_right());
    assert!(!harness.session.evidence_page_right());
    assert_eq!(harness.session.pager().offset(), 2);

    let last = names(&harness);
    assert_eq!(last[0].as_deref(), Some("01"));
    assert_eq!(last[1].as_deref(), Some("03"));
    assert_eq!(last[10].as_deref(), Some("12"));
    assert_eq!(last[11], None);

    assert!(harness.session.evidence_page_left());
    assert_eq!(names(&harness)[11].as_deref(), Some("12"));

    // reopening starts from the first page
    harness.session.close_evidence();
    harness.session.open_evidence();
    assert_eq!(harness.session.pager().offset(), 0);
}

// ============================================================================
// Map
// ============================================================================

#[test]
fn test_map_opens_on_default_page_and_switches() {
    let mut harness = TestHarness::new();
    let page = harness.session.open_map().unwrap();
    assert_eq!(page.id, "1f");
    assert_eq!(harness.session.screen(), Screen::Map);

    let click = harness.session.click_map(&screen(), 50.0, 50.0).unwrap();
    assert_eq!(click, MapClick::SwitchedPage("2f".to_string()));
    assert_eq!(harness.session.current_map_page().unwrap().id, "2f");

    harness.session.close_map();
    assert_eq!(harness.session.open_map().unwrap().id, "2f");
}

#[test]
fn test_map_pages_wrap_around() {
    let mut harness = TestHarness::new();
    harness.session.open_map().unwrap();
    assert_eq!(harness.session.map_page_right().unwrap().id, "2f");
    assert_eq!(harness.session.map_page_right().unwrap().id, "1f");
    assert_eq!(harness.session.map_page_left().unwrap().id, "2f");
}

#[test]
fn test_map_investigation() {
    let mut harness = TestHarness::new();
    let hiro = harness.session.data().detective;
    harness.talk_to("Leia");
    harness.session.open_map().unwrap();

    let click = harness.session.click_map(&screen(), 600.0, 600.0).unwrap();
    let outcome = match click {
        MapClick::Investigated(outcome) => outcome,
        other => panic!("expected an investigation, got {other:?}"),
    };
    assert_eq!(outcome.granted.as_deref(), Some("03"));
    assert_obtained(&harness.session, "03");
    assert_eq!(harness.session.screen(), Screen::Dialogue);
    assert_eq!(harness.session.background(), Some("bg/kitchen.png"));
    assert_eq!(harness.session.current_actor_id(), hiro);
    assert_last_message(&harness.session, hiro, Role::Assistant, "A teacup, still warm.");
    assert_eq!(harness.session.action_countdown(), 657);

    // a second visit finds nothing new but still costs an action
    harness.session.open_map().unwrap();
    let click = harness.session.click_map(&screen(), 600.0, 600.0).unwrap();
    assert!(matches!(click, MapClick::Investigated(ref o) if o.granted.is_none()));
    assert_eq!(harness.session.action_countdown(), 656);
}

#[test]
fn test_map_investigation_without_evidence() {
    let mut harness = TestHarness::new();
    harness.session.open_map().unwrap();
    let click = harness.session.click_map(&screen(), 900.0, 600.0).unwrap();
    assert!(matches!(click, MapClick::Investigated(ref o) if o.message == "Only rain."));
    // the background stays where it was
    assert_eq!(harness.session.background(), Some("bg/hall.png"));
}

#[test]
fn test_map_close_and_miss() {
    let mut harness = TestHarness::new();
    harness.session.open_map().unwrap();
    assert_eq!(
        harness.session.click_map(&screen(), 1500.0, 900.0).unwrap(),
        MapClick::Missed
    );
    assert_eq!(
        harness.session.click_map(&screen(), 1850.0, 50.0).unwrap(),
        MapClick::Closed
    );
    assert_eq!(harness.session.screen(), Screen::Dialogue);
}

// ============================================================================
// Countdown and accusation
// ============================================================================

fn short_game(actions: u32) -> TestHarness {
    let mut data = sample_game_data();
    data.action_countdown = actions;
    TestHarness::with_data(data, vec![MockReply::say("Fine.")])
}

#[tokio::test]
async fn test_countdown_forces_accusation() {
    let mut harness = short_game(2);
    harness.talk_to("Leia");
    harness.present("01");
    assert!(!harness.session.end_game());

    harness.say("Tell me more.").await.unwrap();
    assert_eq!(harness.session.action_countdown(), 0);
    assert!(harness.session.countdown_ended());
    assert!(harness.session.end_game());
    assert_eq!(harness.session.background(), Some("bg/end.png"));
    assert_eq!(harness.session.current_actor_id(), ActorId(1));

    assert!(matches!(
        harness.session.resume_game(),
        Err(SessionError::CountdownEnded)
    ));
    assert!(matches!(
        harness.session.send_message("Wait").await,
        Err(SessionError::InEndGame)
    ));
    assert!(matches!(
        harness.session.present("09"),
        Err(SessionError::InEndGame)
    ));
}

#[tokio::test]
async fn test_failed_chat_is_free() {
    let mut data = sample_game_data();
    data.action_countdown = 1;
    let mut harness = TestHarness::with_data(
        data,
        vec![MockReply::Fail {
            status: 503,
            message: "busy".to_string(),
        }],
    );
    harness.talk_to("Leia");
    harness.say("Hello?").await.unwrap();
    assert_eq!(harness.session.action_countdown(), 1);
    assert!(!harness.session.end_game());
}

#[test]
fn test_voluntary_accusation_can_be_withdrawn() {
    let mut harness = TestHarness::new();
    harness.session.enter_end_game().unwrap();
    assert!(harness.session.end_game());
    harness.session.resume_game().unwrap();
    assert!(!harness.session.end_game());
    assert!(matches!(
        harness.session.resume_game(),
        Err(SessionError::NotInEndGame)
    ));
}

#[tokio::test]
async fn test_accusation_reveal() {
    let mut harness = TestHarness::with_replies(vec![
        MockReply::say("Hm."),
        MockReply::say("You have seen through it all."),
    ]);
    let leia = harness.talk_to("Leia");
    harness.say("Hello").await.unwrap();

    assert!(matches!(
        harness.session.choose_answer(0),
        Err(SessionError::NotInEndGame)
    ));
    harness.session.enter_end_game().unwrap();
    assert!(harness.session.submit_accusation().await.is_err());

    harness.session.choose_answer(0).unwrap();
    assert!(harness.session.choose_answer(5).is_err());
    harness.session.choose_answer(0).unwrap();
    assert!(harness.session.accusation().is_complete(&harness.session.data().accusation));

    let outcome = harness.session.submit_accusation().await.unwrap();
    assert!(matches!(
        outcome,
        Some(mystery_core::DialogueOutcome::Replied { ref text, .. })
            if text == "You have seen through it all."
    ));
    assert!(harness.session.post_game());
    assert!(!harness.session.end_game());

    let margo = harness.actor_id("Margo");
    assert_eq!(harness.session.current_actor_id(), margo);
    assert!(harness.session.actor(leia).unwrap().messages.is_empty());

    let request = harness.backend.last_request().unwrap();
    assert_eq!(
        request.actor.messages[0].content,
        "I know what happened.\nWho moved the body? Leia\nWhere was the host killed? Library"
    );
    assert_eq!(harness.session.actor(margo).unwrap().messages.len(), 2);
}

// ============================================================================
// Notes and dialogue flow
// ============================================================================

#[test]
fn test_notes() {
    let mut harness = TestHarness::new();
    assert_eq!(harness.session.notes().notes().len(), 1);

    let id = harness.session.add_note();
    assert!(harness.session.update_note(id, "Leia lied about the hall."));
    assert_eq!(
        harness.session.notes().get(id).unwrap().content,
        "Leia lied about the hall."
    );
    assert!(harness.session.delete_note(id));
    assert!(!harness.session.update_note(id, "gone"));

    let remaining = harness.session.notes().notes()[0].id;
    assert!(!harness.session.delete_note(remaining));
}

#[tokio::test]
async fn test_continue_flag_tracks_reply() {
    let mut harness = TestHarness::with_replies(vec![MockReply::say("First."), MockReply::say("Second.")]);
    let leia = harness.talk_to("Leia");

    harness.say("One").await.unwrap();
    assert!(!harness.session.dialogue(leia).continue_requested());
    assert!(matches!(
        harness.session.send_message("Too soon").await,
        Err(SessionError::Dialogue(_))
    ));

    harness.session.request_continue().await.unwrap();
    assert!(harness.session.dialogue(leia).continue_requested());
    assert_eq!(harness.session.phase(), DialoguePhase::AwaitingInput);

    harness.say("Two").await.unwrap();
    assert!(!harness.session.dialogue(leia).continue_requested());
}

#[tokio::test]
async fn test_repeated_reply_shows_instantly() {
    let mut harness = TestHarness::with_replies(vec![MockReply::say("Same."), MockReply::say("Same.")]);
    harness.talk_to("Leia");

    let first = harness.say("A").await.unwrap();
    assert!(matches!(
        first,
        mystery_core::DialogueOutcome::Replied { reveal: mystery_core::Reveal::Typewriter, .. }
    ));
    let second = harness.say("B").await.unwrap();
    assert!(matches!(
        second,
        mystery_core::DialogueOutcome::Replied { reveal: mystery_core::Reveal::Instant, .. }
    ));
}
