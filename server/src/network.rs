//! Server network layer: one task per TCP connection plus one task per battle

use crate::client_manager::{ClientManager, QueueEntry};
use crate::config::ServerConfig;
use crate::game::Battle;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    decode, encode, frame, Action, ClientRequest, ClosestPlayer, LoginReply, LoginRequest,
    MatchAssignment, MatchStart, MoveRequest, PartsConfiguration, RoundReport, WireMessage,
    FRAME_SIZE,
};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;

/// What a connection task tells its battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleEventKind {
    /// The player confirmed the match.
    Ready,
    Move(Action),
    /// The connection is gone; every further move counts as a forfeit.
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BattleEvent {
    pub seat: usize,
    pub kind: BattleEventKind,
}

/// Handed to a queued connection once it has been paired.
#[derive(Debug)]
pub struct MatchTicket {
    pub session_id: String,
    pub opponent_id: String,
    pub opponent_parts: PartsConfiguration,
    seat: usize,
    events: mpsc::Sender<BattleEvent>,
    reports: mpsc::Receiver<RoundReport>,
}

impl MatchTicket {
    async fn notify(&self, kind: BattleEventKind) {
        let event = BattleEvent {
            seat: self.seat,
            kind,
        };
        if let Err(e) = self.events.send(event).await {
            debug!("Battle {} already finished: {}", self.session_id, e);
        }
    }
}

type Clients = Arc<Mutex<ClientManager>>;

/// The arena server.
pub struct Server {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    clients: Clients,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(config.address()).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let clients = ClientManager::new(config.max_clients, &config.accounts);
        Ok(Server {
            listener,
            config: Arc::new(config),
            clients: Arc::new(Mutex::new(clients)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared bookkeeping, for inspection.
    pub fn clients(&self) -> Arc<Mutex<ClientManager>> {
        Arc::clone(&self.clients)
    }

    /// Accepts connections until the task is dropped.
    pub async fn run(self) -> io::Result<()> {
        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
            };

            let admitted = self.clients.lock().await.admit(addr);
            let Some(connection_id) = admitted else {
                warn!("Server full, refusing {}", addr);
                continue;
            };
            if let Err(e) = stream.set_nodelay(true) {
                debug!("Could not set nodelay for {}: {}", addr, e);
            }

            let config = Arc::clone(&self.config);
            let clients = Arc::clone(&self.clients);
            tokio::spawn(async move {
                let mut connection = Connection {
                    stream,
                    config,
                    clients: Arc::clone(&clients),
                };
                connection.handle().await;
                clients.lock().await.release(connection_id);
                debug!("Connection {} closed", connection_id);
            });
        }
    }
}

async fn read_frame(stream: &mut TcpStream, wait: Duration) -> io::Result<WireMessage> {
    let mut buffer = [0u8; FRAME_SIZE];
    match timeout(wait, stream.read_exact(&mut buffer)).await {
        Ok(result) => {
            result?;
            Ok(decode(&buffer))
        }
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out")),
    }
}

async fn write_frame<S: AsRef<str>>(stream: &mut TcpStream, fields: &[S]) -> io::Result<()> {
    let bytes = frame(fields).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    stream.write_all(&bytes).await?;
    stream.flush().await
}

/// Descriptors for as many players as fit in one frame.
fn player_list_fields(players: &[ClosestPlayer]) -> Vec<String> {
    let mut fields = Vec::new();
    for player in players {
        fields.push(player.descriptor());
        let mut candidate = fields.clone();
        candidate.push(String::new());
        if encode(&candidate).len() > FRAME_SIZE {
            fields.pop();
            break;
        }
    }
    fields.push(String::new());
    fields
}

struct Connection {
    stream: TcpStream,
    config: Arc<ServerConfig>,
    clients: Clients,
}

impl Connection {
    async fn handle(&mut self) {
        let user_id = match self.login().await {
            Ok(Some(user_id)) => user_id,
            Ok(None) => return,
            Err(e) => {
                debug!("Login aborted: {}", e);
                return;
            }
        };

        if let Err(e) = self.serve(&user_id).await {
            debug!("Connection of {} ended: {}", user_id, e);
        }
        self.clients.lock().await.sign_out(&user_id);
    }

    async fn login(&mut self) -> io::Result<Option<String>> {
        let message = read_frame(&mut self.stream, self.config.read_timeout).await?;
        let request = match LoginRequest::from_message(&message) {
            Ok(request) => request,
            Err(e) => {
                warn!("Malformed login: {}", e);
                write_frame(&mut self.stream, &LoginReply::rejected().to_fields()).await?;
                return Ok(None);
            }
        };

        let result = self
            .clients
            .lock()
            .await
            .sign_in(&request.user_id, &request.password);
        match result {
            Ok(parts) => {
                write_frame(&mut self.stream, &LoginReply::Accepted { parts }.to_fields()).await?;
                Ok(Some(request.user_id))
            }
            Err(e) => {
                warn!("Login refused: {}", e);
                write_frame(&mut self.stream, &LoginReply::rejected().to_fields()).await?;
                Ok(None)
            }
        }
    }

    /// The idle loop between matches.
    async fn serve(&mut self, user_id: &str) -> io::Result<()> {
        loop {
            let message = read_frame(&mut self.stream, self.config.idle_timeout).await?;
            match ClientRequest::parse(&message) {
                Ok(ClientRequest::SignOut) => return Ok(()),
                Ok(ClientRequest::ListPlayers { .. }) => {
                    let players = self.clients.lock().await.closest_players(user_id);
                    write_frame(&mut self.stream, &player_list_fields(&players)).await?;
                }
                Ok(ClientRequest::QuickMatch(request)) => {
                    if !self.quick_match(user_id, request.parts).await? {
                        return Ok(());
                    }
                }
                Ok(ClientRequest::Confirm) => debug!("Stray confirm from {}", user_id),
                Err(e) => warn!("Ignoring frame from {}: {}", user_id, e),
            }
        }
    }

    /// Queues the player and plays the match if one is found.
    ///
    /// Returns false when the player signed out instead of playing.
    async fn quick_match(&mut self, user_id: &str, parts: PartsConfiguration) -> io::Result<bool> {
        let (ticket, mut ticket_rx) = oneshot::channel();
        {
            let mut clients = self.clients.lock().await;
            let entry = QueueEntry {
                user_id: user_id.to_string(),
                parts,
                ticket,
            };
            if let Some(pair) = clients.enqueue(entry) {
                let session_id = clients.next_session_id();
                start_battle(session_id, pair, Arc::clone(&self.clients)).await;
            }
        }

        let ticket = match timeout(self.config.match_wait, &mut ticket_rx).await {
            Ok(ticket) => ticket.ok(),
            Err(_) => {
                if self.clients.lock().await.withdraw(user_id) {
                    None
                } else {
                    // Paired just as the wait ran out; the ticket is on its way.
                    ticket_rx.await.ok()
                }
            }
        };

        let Some(ticket) = ticket else {
            info!("No opponent for {}", user_id);
            write_frame(&mut self.stream, &MatchStart::NoOpponent.to_fields()).await?;
            return Ok(true);
        };

        let start = MatchStart::Matched(MatchAssignment {
            session_id: ticket.session_id.clone(),
            opponent_id: ticket.opponent_id.clone(),
            opponent_parts: ticket.opponent_parts.clone(),
        });
        if let Err(e) = write_frame(&mut self.stream, &start.to_fields()).await {
            ticket.notify(BattleEventKind::Left).await;
            return Err(e);
        }
        self.play(ticket).await
    }

    async fn play(&mut self, mut ticket: MatchTicket) -> io::Result<bool> {
        let message = match read_frame(&mut self.stream, self.config.read_timeout).await {
            Ok(message) => message,
            Err(e) => {
                ticket.notify(BattleEventKind::Left).await;
                return Err(e);
            }
        };
        match ClientRequest::parse(&message) {
            Ok(ClientRequest::Confirm) => {}
            Ok(ClientRequest::SignOut) => {
                ticket.notify(BattleEventKind::Left).await;
                return Ok(false);
            }
            _ => warn!("Expected confirm for {}", ticket.session_id),
        }
        ticket.notify(BattleEventKind::Ready).await;

        loop {
            let Some(report) = ticket.reports.recv().await else {
                return Ok(true);
            };
            if let Err(e) = write_frame(&mut self.stream, &report.to_fields()).await {
                ticket.notify(BattleEventKind::Left).await;
                return Err(e);
            }
            if report.status.is_final() {
                return Ok(true);
            }

            let message = match read_frame(&mut self.stream, self.config.read_timeout).await {
                Ok(message) => message,
                Err(e) => {
                    ticket.notify(BattleEventKind::Left).await;
                    return Err(e);
                }
            };
            if ClientRequest::parse(&message) == Ok(ClientRequest::SignOut) {
                ticket.notify(BattleEventKind::Left).await;
                return Ok(false);
            }
            let action = MoveRequest::from_message(&message)
                .map(|request| request.action)
                .unwrap_or(Action::Forfeit);
            ticket.notify(BattleEventKind::Move(action)).await;
        }
    }
}

/// Hands both players their ticket and spawns the battle.
async fn start_battle(session_id: String, pair: (QueueEntry, QueueEntry), clients: Clients) {
    let (first, second) = pair;
    info!("{}: {} vs {}", session_id, first.user_id, second.user_id);

    let battle = Battle::new([&first.parts, &second.parts], StdRng::from_entropy());
    let (events_tx, events_rx) = mpsc::channel(8);
    let (first_tx, first_rx) = mpsc::channel(4);
    let (second_tx, second_rx) = mpsc::channel(4);

    let players = [first.user_id.clone(), second.user_id.clone()];
    let seats = [
        (first.ticket, second.user_id, second.parts, first_rx),
        (second.ticket, first.user_id, first.parts, second_rx),
    ];
    for (seat, (sender, opponent_id, opponent_parts, reports)) in seats.into_iter().enumerate() {
        let ticket = MatchTicket {
            session_id: session_id.clone(),
            opponent_id,
            opponent_parts,
            seat,
            events: events_tx.clone(),
            reports,
        };
        if sender.send(ticket).is_err() {
            // Gone before the match started: it forfeits.
            let _ = events_tx
                .send(BattleEvent {
                    seat,
                    kind: BattleEventKind::Left,
                })
                .await;
        }
    }
    drop(events_tx);

    tokio::spawn(run_battle(
        session_id,
        battle,
        players,
        events_rx,
        [first_tx, second_tx],
        clients,
    ));
}

async fn run_battle(
    session_id: String,
    mut battle: Battle,
    players: [String; 2],
    mut events: mpsc::Receiver<BattleEvent>,
    reports: [mpsc::Sender<RoundReport>; 2],
    clients: Clients,
) {
    let mut ready = [false; 2];
    let mut left = [false; 2];

    while !(ready[0] && ready[1]) {
        match events.recv().await {
            Some(BattleEvent { seat, kind }) => match kind {
                BattleEventKind::Ready => ready[seat] = true,
                BattleEventKind::Left => {
                    ready[seat] = true;
                    left[seat] = true;
                }
                BattleEventKind::Move(_) => debug!("{}: move before confirm ignored", session_id),
            },
            None => return,
        }
    }

    let mut outgoing = battle.opening_reports();
    loop {
        for (seat, report) in outgoing.iter().enumerate() {
            if !left[seat] && reports[seat].send(report.clone()).await.is_err() {
                left[seat] = true;
            }
        }
        if battle.is_over() {
            break;
        }

        let mut moves: [Option<Action>; 2] = [None; 2];
        for seat in 0..2 {
            if left[seat] {
                moves[seat] = Some(Action::Forfeit);
            }
        }
        while moves.iter().any(Option::is_none) {
            match events.recv().await {
                Some(BattleEvent { seat, kind }) => match kind {
                    BattleEventKind::Move(action) if moves[seat].is_none() => {
                        moves[seat] = Some(action)
                    }
                    BattleEventKind::Left => {
                        left[seat] = true;
                        moves[seat].get_or_insert(Action::Forfeit);
                    }
                    _ => {}
                },
                None => break,
            }
        }
        outgoing = battle.play_round(moves.map(|action| action.unwrap_or(Action::Forfeit)));
    }

    let mut clients = clients.lock().await;
    for (seat, player) in players.iter().enumerate() {
        clients.record_result(player, outgoing[seat].status);
    }
    info!(
        "{} finished: {} {}, {} {}",
        session_id, players[0], outgoing[0].status, players[1], outgoing[1].status
    );
}
