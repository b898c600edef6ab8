use arena_server::{AgentHandle, Arena, ArenaConfig, CallbackCommand, Coordinator, GAME_OVER};
use protocol::{CharacterKind, Characteristic, Entity, Point};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Clone, Copy)]
enum Behavior {
    /// Ends every turn right away.
    Idle,
    /// Attacks the first neighbour it sees.
    Attack,
    /// Never answers.
    Mute,
}

#[derive(Debug, Default)]
struct AgentLog {
    turns: usize,
    shutdown: Option<String>,
}

type Journal = Arc<Mutex<Vec<u32>>>;

struct TestAgent {
    reference: u32,
    task: JoinHandle<AgentLog>,
}

fn quick_config() -> ArenaConfig {
    let mut config = ArenaConfig::default();
    config.coordinator.round_pause_ms = 0;
    config.coordinator.turn_timeout_ms = 100;
    config
}

async fn spawn_agent(
    arena: &Arc<Arena>,
    journal: &Journal,
    name: &str,
    values: &[(Characteristic, i32)],
    position: Point,
    turn_budget: Option<u32>,
    behavior: Behavior,
) -> TestAgent {
    let (handle, commands) = AgentHandle::in_process(format!("local/{name}"));
    let entity = Entity::character(name, "G1", CharacterKind::Fighter, values.iter().copied());
    let reference = arena
        .registry()
        .register_character(entity, handle, position, turn_budget)
        .await
        .unwrap();
    arena.character_joined().await;
    let task = tokio::spawn(run_agent(
        arena.clone(),
        reference,
        behavior,
        commands,
        journal.clone(),
    ));
    TestAgent { reference, task }
}

async fn run_agent(
    arena: Arc<Arena>,
    reference: u32,
    behavior: Behavior,
    mut commands: mpsc::Receiver<CallbackCommand>,
    journal: Journal,
) -> AgentLog {
    let mut log = AgentLog::default();
    let mut unanswered = Vec::new();
    while let Some(command) = commands.recv().await {
        match command {
            CallbackCommand::ExecuteTurn { neighbors, reply } => {
                log.turns += 1;
                journal.lock().unwrap().push(reference);
                match behavior {
                    Behavior::Idle => {
                        let _ = reply.send(Ok(()));
                    }
                    Behavior::Attack => {
                        if let Some(target) = neighbors.keys().next() {
                            let _ = arena.resolver().attack(reference, *target).await;
                        }
                        let _ = reply.send(Ok(()));
                    }
                    Behavior::Mute => unanswered.push(reply),
                }
            }
            CallbackCommand::Shutdown { reason } => {
                log.shutdown = Some(reason);
                break;
            }
        }
    }
    log
}

async fn finish(coordinator: Coordinator) -> arena_server::GameSummary {
    tokio::time::timeout(Duration::from_secs(10), coordinator.run())
        .await
        .expect("game did not end")
}

#[tokio::test]
async fn fight_ends_with_one_survivor() {
    let arena = Arc::new(Arena::new(&quick_config()));
    let journal = Journal::default();
    let hunter = spawn_agent(
        &arena,
        &journal,
        "hunter",
        &[(Characteristic::Force, 100), (Characteristic::Initiative, 100)],
        Point::new(10, 10),
        None,
        Behavior::Attack,
    )
    .await;
    let prey = spawn_agent(
        &arena,
        &journal,
        "prey",
        &[],
        Point::new(11, 10),
        None,
        Behavior::Idle,
    )
    .await;
    assert!(arena.is_game_started());

    let summary = finish(Coordinator::new(arena.clone())).await;
    assert_eq!(summary.rounds, 2);
    assert_eq!(summary.survivors.len(), 1);
    assert_eq!(summary.survivors[0].0, hunter.reference);
    assert!(arena.registry().is_buried(prey.reference).await);

    let prey_log = prey.task.await.unwrap();
    assert_eq!(prey_log.turns, 1);
    assert!(prey_log.shutdown.unwrap().starts_with("Killed by"));
    let hunter_log = hunter.task.await.unwrap();
    assert_eq!(hunter_log.turns, 2);
    assert_eq!(hunter_log.shutdown.as_deref(), Some(GAME_OVER));
}

#[tokio::test]
async fn turns_follow_initiative() {
    let mut config = quick_config();
    config.coordinator.max_rounds = Some(1);
    let arena = Arc::new(Arena::new(&config));
    let journal = Journal::default();
    let mut agents = Vec::new();
    for (name, initiative) in [("slow", 10), ("quick", 90), ("middle", 50)] {
        let agent = spawn_agent(
            &arena,
            &journal,
            name,
            &[(Characteristic::Initiative, initiative)],
            Point::new(initiative, 0),
            None,
            Behavior::Idle,
        )
        .await;
        agents.push(agent.reference);
    }

    let summary = finish(Coordinator::new(arena)).await;
    assert_eq!(summary.rounds, 1);
    assert_eq!(*journal.lock().unwrap(), vec![agents[1], agents[2], agents[0]]);
}

#[tokio::test]
async fn silent_agent_is_disconnected_after_the_timeout() {
    let mut config = quick_config();
    config.coordinator.max_rounds = Some(2);
    let arena = Arc::new(Arena::new(&config));
    let journal = Journal::default();
    let mute = spawn_agent(
        &arena,
        &journal,
        "mute",
        &[(Characteristic::Initiative, 100)],
        Point::new(0, 0),
        None,
        Behavior::Mute,
    )
    .await;
    let first = spawn_agent(&arena, &journal, "first", &[], Point::new(30, 30), None, Behavior::Idle).await;
    let second = spawn_agent(&arena, &journal, "second", &[], Point::new(60, 60), None, Behavior::Idle).await;

    let summary = finish(Coordinator::new(arena.clone())).await;
    assert_eq!(summary.rounds, 2);
    assert_eq!(summary.survivors.len(), 2);
    assert!(arena.registry().is_buried(mute.reference).await);

    let mute_log = mute.task.await.unwrap();
    assert_eq!(mute_log.turns, 1);
    assert_eq!(mute_log.shutdown.as_deref(), Some("Turn timed out."));
    for agent in [first, second] {
        let log = agent.task.await.unwrap();
        assert_eq!(log.turns, 2);
        assert_eq!(log.shutdown.as_deref(), Some(GAME_OVER));
    }
}

#[tokio::test]
async fn vanished_agent_is_disconnected() {
    let mut config = quick_config();
    config.coordinator.max_rounds = Some(1);
    let arena = Arc::new(Arena::new(&config));
    let journal = Journal::default();
    let (handle, commands) = AgentHandle::in_process("local/gone");
    drop(commands);
    let gone = arena
        .registry()
        .register_character(
            Entity::character("gone", "G1", CharacterKind::TimeMage, []),
            handle,
            Point::new(5, 5),
            None,
        )
        .await
        .unwrap();
    spawn_agent(&arena, &journal, "a", &[], Point::new(50, 50), None, Behavior::Idle).await;
    spawn_agent(&arena, &journal, "b", &[], Point::new(70, 70), None, Behavior::Idle).await;

    finish(Coordinator::new(arena.clone())).await;
    assert!(arena.registry().is_buried(gone).await);
    assert_eq!(arena.registry().live_count().await, 2);
}

#[tokio::test]
async fn turn_budget_runs_out() {
    let mut config = quick_config();
    config.coordinator.max_rounds = Some(4);
    let arena = Arc::new(Arena::new(&config));
    let journal = Journal::default();
    let limited = spawn_agent(&arena, &journal, "limited", &[], Point::new(1, 1), Some(2), Behavior::Idle).await;
    spawn_agent(&arena, &journal, "x", &[], Point::new(40, 40), None, Behavior::Idle).await;
    spawn_agent(&arena, &journal, "y", &[], Point::new(80, 80), None, Behavior::Idle).await;

    let summary = finish(Coordinator::new(arena)).await;
    assert_eq!(summary.rounds, 4);
    let log = limited.task.await.unwrap();
    assert_eq!(log.turns, 2);
    assert_eq!(log.shutdown.as_deref(), Some("Turn budget used up."));
}

#[tokio::test]
async fn tournament_waits_for_the_start() {
    let mut config = quick_config().with_secret_override(Some("open sesame".into()));
    config.coordinator.max_rounds = Some(1);
    let arena = Arc::new(Arena::new(&config));
    let journal = Journal::default();
    spawn_agent(&arena, &journal, "a", &[], Point::new(1, 1), None, Behavior::Idle).await;
    spawn_agent(&arena, &journal, "b", &[], Point::new(2, 2), None, Behavior::Idle).await;

    let game = tokio::spawn(Coordinator::new(arena.clone()).run());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(journal.lock().unwrap().is_empty());
    assert!(arena.start_game("wrong").is_err());
    assert!(!arena.is_game_started());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(journal.lock().unwrap().is_empty());

    assert_eq!(arena.start_game("open sesame"), Ok(true));
    let summary = tokio::time::timeout(Duration::from_secs(5), game)
        .await
        .expect("coordinator did not start")
        .unwrap();
    assert_eq!(summary.rounds, 1);
    assert_eq!(journal.lock().unwrap().len(), 2);
}
