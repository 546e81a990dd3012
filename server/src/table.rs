use landlord_core::{Game, PlayerId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Bid,
    Play,
    /// The shoe was redealt; the holder opens the new bidding pass.
    Reset,
    /// The round is over; leave the game screen.
    WaitExit,
}

/// Single-slot mailbox holding a player's turn token.
#[derive(Debug)]
pub struct TokenQueue {
    tx: mpsc::Sender<Phase>,
    rx: Mutex<mpsc::Receiver<Phase>>,
    closed: CancellationToken,
}

impl Default for TokenQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            tx,
            rx: Mutex::new(rx),
            closed: CancellationToken::new(),
        }
    }

    /// Non-blocking hand-off. Fails if a token is already waiting or the
    /// queue was closed.
    pub fn hand(&self, phase: Phase) -> bool {
        if self.closed.is_cancelled() {
            return false;
        }
        self.tx.try_send(phase).is_ok()
    }

    pub fn is_pending(&self) -> bool {
        self.tx.capacity() == 0
    }

    pub async fn take(&self) -> Option<Phase> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            phase = rx.recv() => phase,
            _ = self.closed.cancelled() => None,
        }
    }

    pub fn close(&self) {
        self.closed.cancel();
    }
}

#[derive(Debug)]
pub struct Table {
    pub game: Game,
    tokens: HashMap<PlayerId, Arc<TokenQueue>>,
}

impl Table {
    pub fn new(game: Game) -> Self {
        let tokens = game
            .players
            .iter()
            .map(|player| (*player, Arc::new(TokenQueue::new())))
            .collect();
        Self { game, tokens }
    }

    pub fn token(&self, player: PlayerId) -> Option<Arc<TokenQueue>> {
        self.tokens.get(&player).cloned()
    }

    pub fn hand(&self, player: PlayerId, phase: Phase) -> bool {
        let handed = self
            .tokens
            .get(&player)
            .map(|queue| queue.hand(phase))
            .unwrap_or(false);
        if !handed {
            warn!(player_id = player, ?phase, "turn token could not be handed off");
        }
        handed
    }

    pub fn pending_tokens(&self) -> usize {
        self.tokens.values().filter(|queue| queue.is_pending()).count()
    }

    pub fn release_all(&self, phase: Phase) {
        for queue in self.tokens.values() {
            queue.hand(phase);
        }
    }

    pub fn close(&self) {
        for queue in self.tokens.values() {
            queue.close();
        }
    }
}
