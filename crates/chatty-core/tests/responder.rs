mod common;

use std::time::Duration;

use anyhow::anyhow;
use chatty_core::stream::OutgoingMessage;
use chatty_types::ChannelId;
use chatty_types::api::Register;
use chatty_types::events::GatewayEvent;
use chatty_types::models::{GameStatus, GameType, PersonaDetails};

use common::{ScriptedCompletion, harness, next_event};

fn activity(channel: &ChannelId, active: bool) -> impl Fn(&GatewayEvent) -> bool + '_ {
    move |event: &GatewayEvent| {
        matches!(event, GatewayEvent::ResponderActivity { channel_id, active: a }
            if channel_id == channel && *a == active)
    }
}

#[tokio::test(start_paused = true)]
async fn bot_replies_after_the_artificial_delay() {
    let completion = ScriptedCompletion::new(vec![Ok("  scene on hai bro 🔥 ".into())]);
    let h = harness(completion.clone());
    h.user("alice").await;
    h.engine.profiles().seed_bots().await.unwrap();
    let channel = ChannelId::between("alice", "bot_1");
    let mut events = h.dispatcher.subscribe();

    let started = tokio::time::Instant::now();
    h.engine
        .stream()
        .send(OutgoingMessage::text("alice", "bot_1", "kya chal raha"))
        .await
        .unwrap();

    next_event(&mut events, activity(&channel, true)).await;
    let messages = h.wait_for_messages("alice", "bot_1", 2).await;
    assert!(started.elapsed() >= Duration::from_millis(1500));
    next_event(&mut events, activity(&channel, false)).await;

    let reply = &messages[1];
    assert_eq!(reply.sender_id, "bot_1");
    assert_eq!(reply.receiver_id, "alice");
    assert_eq!(reply.content, "scene on hai bro 🔥");

    let prompts = completion.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].starts_with("You are @zoya_poet. Your bio: "));
    assert!(prompts[0].contains("Friend says: \"kya chal raha\""));
}

#[tokio::test(start_paused = true)]
async fn each_message_gets_its_own_reply() {
    let completion = ScriptedCompletion::new(vec![Ok("one".into()), Ok("two".into())]);
    let h = harness(completion);
    h.user("alice").await;
    h.engine.profiles().seed_bots().await.unwrap();
    let stream = h.engine.stream();

    stream.send(OutgoingMessage::text("alice", "bot_2", "first")).await.unwrap();
    stream.send(OutgoingMessage::text("alice", "bot_2", "second")).await.unwrap();

    let messages = h.wait_for_messages("alice", "bot_2", 4).await;
    let from_bot = messages.iter().filter(|m| m.sender_id == "bot_2").count();
    assert_eq!(from_bot, 2);
}

#[tokio::test(start_paused = true)]
async fn failed_completion_degrades_to_a_notice() {
    let completion = ScriptedCompletion::new(vec![Err(anyhow!("quota exceeded"))]);
    let h = harness(completion);
    h.user("alice").await;
    h.engine.profiles().seed_bots().await.unwrap();
    let channel = ChannelId::between("alice", "bot_3");
    let mut events = h.dispatcher.subscribe();

    h.engine
        .stream()
        .send(OutgoingMessage::text("alice", "bot_3", "gg?"))
        .await
        .unwrap();

    let notice = next_event(&mut events, |e| matches!(e, GatewayEvent::Notice { .. })).await;
    let GatewayEvent::Notice { user_id, .. } = notice else { unreachable!() };
    assert_eq!(user_id, "alice");
    next_event(&mut events, activity(&channel, false)).await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.messages("alice", "bot_3").await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_dare_brings_a_punishment() {
    let completion = ScriptedCompletion::new(vec![
        Ok("Text your crush 'hi' right now".into()),
        Ok("Do 20 squats on video lol".into()),
    ]);
    let h = harness(completion);
    h.user("alice").await;
    h.user("bob").await;
    h.friends("alice", "bob").await;
    let responder = h.engine.responder();

    let dare = responder.truth_or_dare("alice", "bob").await.unwrap().unwrap();
    assert_eq!(dare.content, "🎲 T&D: Text your crush 'hi' right now");
    assert_eq!(dare.game_type, Some(GameType::TruthDare));
    assert_eq!(dare.status, Some(GameStatus::Pending));

    h.engine
        .stream()
        .advance_game_status("bob", "alice", &dare.id, GameStatus::Failed)
        .await
        .unwrap();

    let messages = h.wait_for_messages("alice", "bob", 2).await;
    let punishment = &messages[1];
    assert_eq!(punishment.sender_id, "bob");
    assert_eq!(punishment.receiver_id, "alice");
    assert!(punishment.is_system);
    assert_eq!(punishment.content, "💀 PUNISHMENT: Do 20 squats on video lol");
    assert_eq!(messages[0].status, Some(GameStatus::Failed));
}

#[tokio::test(start_paused = true)]
async fn on_demand_modes_parse_their_output() {
    let completion = ScriptedCompletion::new(vec![
        Ok("kya scene hai | bol na yaar | chal bata".into()),
        Ok("  What is going on?  ".into()),
        Ok("haan bilkul | phir milte | lol same".into()),
        Ok("Besties | 88% | Pure vibes only".into()),
    ]);
    let h = harness(completion.clone());
    h.user("alice").await;
    h.user("bob").await;
    let responder = h.engine.responder();
    let stream = h.engine.stream();

    let variants = responder
        .rephrase("alice", "bob", "what's up", Register::Hindi)
        .await
        .unwrap();
    assert_eq!(variants, vec!["kya scene hai", "bol na yaar", "chal bata"]);
    assert!(completion.prompts()[0].contains("3 short Gen-Z hindi variations"));

    let translated = responder.translate("alice", "bob", "kya scene hai").await.unwrap();
    assert_eq!(translated.as_deref(), Some("What is going on?"));

    // Nothing to suggest from an empty channel, and no call is made
    assert!(responder.suggest("alice", "bob").await.unwrap().is_empty());
    assert_eq!(completion.prompts().len(), 2);

    stream.send(OutgoingMessage::text("alice", "bob", "hey")).await.unwrap();
    stream.send(OutgoingMessage::text("bob", "alice", "yo")).await.unwrap();
    let suggestions = responder.suggest("alice", "bob").await.unwrap();
    assert_eq!(suggestions.len(), 3);
    assert!(completion.prompts()[2].contains("hey\nyo"));

    let report = responder.relationship_report("alice", "bob").await.unwrap().unwrap();
    assert_eq!(
        report.content,
        "📊 REPORT CARD:\n\n❤️ Type: Besties\n🔥 Score: 88%\n📝 Analysis: Pure vibes only"
    );
    assert_eq!(report.game_type, Some(GameType::Report));
    assert_eq!(report.status, None);
    assert!(completion.prompts()[3].contains("A: hey\nB: yo"));

    // Script exhausted: every mode degrades instead of failing
    assert!(responder.rephrase("alice", "bob", "x", Register::Hinglish).await.unwrap().is_empty());
    assert!(responder.truth_or_dare("alice", "bob").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn persona_query_needs_counterpart_details() {
    let completion = ScriptedCompletion::new(vec![Ok("Saturn smiles on you.".into())]);
    let h = harness(completion.clone());
    h.user("alice").await;
    h.user("bob").await;
    let responder = h.engine.responder();

    assert!(
        responder
            .persona_query("alice", "bob", "will we vibe?", Register::Hinglish)
            .await
            .unwrap()
            .is_none()
    );
    assert!(completion.prompts().is_empty());

    let channel = ChannelId::between("alice", "bob");
    let details = PersonaDetails {
        name: "Bob".into(),
        dob: "2001-02-03".into(),
        time: "07:00".into(),
        place: "Delhi".into(),
    };
    h.engine.stream().set_persona_details(&channel, "bob", details).await.unwrap();

    let message = responder
        .persona_query("alice", "bob", "will we vibe?", Register::Hinglish)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.content, "🔮 ASTRO: Saturn smiles on you.");
    assert!(message.is_system);
    assert_eq!(message.game_type, Some(GameType::Astro));
    assert!(completion.prompts()[0].contains("\"place\":\"Delhi\""));
}

#[tokio::test(start_paused = true)]
async fn slow_completion_times_out() {
    struct Stalled;

    #[async_trait::async_trait]
    impl chatty_core::CompletionService for Stalled {
        async fn complete(&self, _model_hint: &str, _prompt: &str) -> anyhow::Result<String> {
            std::future::pending().await
        }
    }

    let h = harness(std::sync::Arc::new(Stalled));
    h.user("alice").await;
    h.user("bob").await;
    let mut events = h.dispatcher.subscribe();

    let translated = h.engine.responder().translate("alice", "bob", "hello").await.unwrap();
    assert!(translated.is_none());
    next_event(&mut events, |e| matches!(e, GatewayEvent::Notice { .. })).await;
}
