use landlord_server::players::Player;
use landlord_server::protocol::ServerMessage;
use landlord_server::{session, EngineConfig, GameKind, RoomManager, RoomState, TurnEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

const BID_PROMPT: &str = "(y or n)";

struct Lobby {
    manager: Arc<RoomManager>,
    room: u64,
    players: Vec<Arc<Player>>,
    outboxes: Vec<UnboundedReceiver<ServerMessage>>,
}

impl Lobby {
    /// Three players waiting in one room, each driven by a real session task.
    async fn open() -> Self {
        let manager = Arc::new(RoomManager::default());
        let engine = Arc::new(TurnEngine::new(
            manager.clone(),
            EngineConfig {
                bid_timeout: Duration::from_secs(5),
                play_timeout: Duration::from_secs(5),
            },
        ));
        let mut players = Vec::new();
        let mut outboxes = Vec::new();
        for id in 1..=3 {
            let (tx, rx) = unbounded_channel();
            players.push(manager.connect(id, id, &format!("p{id}"), Some(tx)));
            outboxes.push(rx);
        }
        let room = manager.create_room(1, GameKind::LaiZi, "", 0).unwrap().id;
        manager.join_room(room, 2, "").unwrap();
        manager.join_room(room, 3, "").unwrap();
        for player in players.iter() {
            assert!(player.claim_session());
            tokio::spawn(session::run(manager.clone(), engine.clone(), player.clone()));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        Lobby {
            manager,
            room,
            players,
            outboxes,
        }
    }

    fn start(&self) -> (u64, u64) {
        self.manager.start_game(self.room, 1, 17).unwrap();
        let room = self.manager.room(self.room).unwrap();
        let inner = room.lock();
        let game = &inner.table.as_ref().unwrap().game;
        (game.opener, game.next_player(game.opener))
    }

    fn outbox(&mut self, id: u64) -> &mut UnboundedReceiver<ServerMessage> {
        &mut self.outboxes[(id - 1) as usize]
    }
}

async fn expect_text(rx: &mut UnboundedReceiver<ServerMessage>, needle: &str) -> String {
    let wait = async {
        loop {
            match rx.recv().await {
                Some(ServerMessage::Text { body }) if body.contains(needle) => return body,
                Some(_) => continue,
                None => panic!("outbox closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(600), wait)
        .await
        .expect("message never arrived")
}

#[tokio::test(start_paused = true)]
async fn seat_lost_right_after_the_start_is_played_by_default() {
    let mut lobby = Lobby::open().await;
    let (opener, second) = lobby.start();
    lobby.manager.offline(opener);

    expect_text(lobby.outbox(second), BID_PROMPT).await;
    assert_eq!(lobby.manager.room_members(lobby.room), Some(vec![1, 2, 3]));
    let room = lobby.manager.room(lobby.room).unwrap();
    assert_eq!(room.state(), RoomState::Running);
    let inner = room.lock();
    let table = inner.table.as_ref().unwrap();
    assert!(table.pending_tokens() <= 1);
    assert!(!lobby.players[(opener - 1) as usize].is_online());
}

#[tokio::test(start_paused = true)]
async fn exit_right_after_the_start_keeps_the_seat() {
    let mut lobby = Lobby::open().await;
    let (opener, _) = lobby.start();
    assert!(lobby.players[(opener - 1) as usize].deliver("exit".to_string()));

    expect_text(lobby.outbox(opener), BID_PROMPT).await;
    assert_eq!(lobby.manager.room_members(lobby.room), Some(vec![1, 2, 3]));
    assert_eq!(lobby.players[(opener - 1) as usize].room_id(), lobby.room);
}
