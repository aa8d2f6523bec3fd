//! gateway-chat: terminal chat front-end for the agent gateway.
//! Reads config, connects, sends stdin lines (or one positional message) as
//! chat messages and prints replies to stdout. Logs go to stderr.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gateway_chat_client::config::{self, Config};
use gateway_chat_client::messages::InboundFrame;
use gateway_chat_client::{
    ClientConfig, ConnectionStatus, GatewayClient, Message, Role, TransportEventKind,
    WsTransportFactory,
};

#[derive(Parser, Debug)]
#[command(name = "gateway-chat", version, about = "Chat with an agent gateway from the terminal")]
struct Args {
    /// Config file (default: ~/.gateway-chat/config.yaml).
    #[arg(long, env = "GATEWAY_CHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Gateway WebSocket URL.
    #[arg(long, env = "GATEWAY_CHAT_URL")]
    url: Option<String>,

    /// Gateway auth token.
    #[arg(long, env = "GATEWAY_CHAT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(long)]
    session_key: Option<String>,

    /// Model override sent with every message.
    #[arg(long)]
    model: Option<String>,

    /// Send this message, print the reply and exit.
    message: Option<String>,
}

/// Observer notifications, forwarded out of the client's callbacks.
enum UiEvent {
    Message(Message),
    Chunk(String),
    Status(ConnectionStatus),
}

fn load_config(args: &Args) -> Config {
    let path = args.config.clone().or_else(config::default_config_path);
    let mut cfg = match path {
        Some(path) => config::load_or_default(&path).unwrap_or_else(|e| {
            eprintln!("Error: failed to load config from {}: {}", path.display(), e);
            process::exit(1);
        }),
        None => Config::default(),
    };

    if let Some(url) = &args.url {
        cfg.gateway.url = Some(url.clone());
    }
    if let Some(token) = &args.token {
        cfg.gateway.token = Some(token.clone());
    }
    if let Some(session_key) = &args.session_key {
        cfg.gateway.session_key = Some(session_key.clone());
    }
    if let Some(model) = &args.model {
        cfg.chat.model = Some(model.clone());
    }
    cfg
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();
    let cfg = load_config(&args);
    let client_config = cfg.client_config().unwrap_or_else(|e| {
        eprintln!("Error: invalid config: {}", e);
        process::exit(1);
    });

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Error: failed to create runtime: {}", e);
            process::exit(1);
        });

    let code = rt.block_on(run(client_config, cfg.chat.model, args.message));
    process::exit(code);
}

async fn run(config: ClientConfig, model: Option<String>, one_shot: Option<String>) -> i32 {
    let (factory, mut events) = WsTransportFactory::new();
    let mut session = Session::new(config.gateway_url.clone(), model);
    let mut client = GatewayClient::new(config, Box::new(factory));

    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
    let tx = ui_tx.clone();
    client.on_message(move |m| {
        let _ = tx.send(UiEvent::Message(m.clone()));
    });
    let tx = ui_tx.clone();
    client.on_stream(move |chunk| {
        let _ = tx.send(UiEvent::Chunk(chunk.to_string()));
    });
    client.on_status(move |status| {
        let _ = ui_tx.send(UiEvent::Status(*status));
    });

    let mut stdin_open = match one_shot {
        Some(message) => {
            session.queue(message);
            session.finish_after_reply = true;
            false
        }
        None => true,
    };
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    client.connect();

    loop {
        while let Ok(event) = ui_rx.try_recv() {
            if let Some(code) = session.on_ui_event(event, &mut client) {
                return code;
            }
        }
        session.replaying_history = false;

        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    if let TransportEventKind::Frame(text) = &event.kind {
                        session.replaying_history =
                            matches!(InboundFrame::parse(text), Ok(InboundFrame::History(_)));
                    }
                    client.handle_transport_event(event);
                }
                None => return 1,
            },
            line = stdin.next_line(), if stdin_open => {
                let outcome = match line {
                    Ok(Some(line)) => session.on_input(line, &mut client),
                    Ok(None) | Err(_) => {
                        stdin_open = false;
                        session.on_input_closed(&mut client)
                    }
                };
                if let Some(code) = outcome {
                    return code;
                }
            }
        }
    }
}

/// Front-end state layered over the client's observer callbacks.
struct Session {
    url: String,
    model: Option<String>,
    /// Lines typed before the handshake finished.
    pending: VecDeque<String>,
    connected: bool,
    ever_connected: bool,
    awaiting_reply: bool,
    finish_after_reply: bool,
    quitting: bool,
    streaming_open: bool,
    /// Messages currently being delivered came from `chat.history`.
    replaying_history: bool,
}

impl Session {
    fn new(url: String, model: Option<String>) -> Self {
        Self {
            url,
            model,
            pending: VecDeque::new(),
            connected: false,
            ever_connected: false,
            awaiting_reply: false,
            finish_after_reply: false,
            quitting: false,
            streaming_open: false,
            replaying_history: false,
        }
    }

    fn queue(&mut self, line: String) {
        self.pending.push_back(line);
        self.awaiting_reply = true;
    }

    fn on_ui_event(&mut self, event: UiEvent, client: &mut GatewayClient) -> Option<i32> {
        match event {
            UiEvent::Status(ConnectionStatus::Connecting) => {
                tracing::info!(url = %self.url, "Connecting");
                None
            }
            UiEvent::Status(ConnectionStatus::Connected) => {
                self.connected = true;
                self.ever_connected = true;
                while let Some(line) = self.pending.pop_front() {
                    client.send_message(&line, self.model.as_deref());
                }
                None
            }
            UiEvent::Status(ConnectionStatus::Disconnected) => {
                self.connected = false;
                self.end_stream_line();
                if self.quitting {
                    Some(0)
                } else if !self.ever_connected {
                    eprintln!("Error: could not connect to gateway at {} (disconnected)", self.url);
                    Some(1)
                } else {
                    eprintln!("Error: gateway at {} disconnected", self.url);
                    Some(1)
                }
            }
            UiEvent::Chunk(chunk) => {
                let mut out = io::stdout().lock();
                if !self.streaming_open {
                    let _ = write!(out, "{}: ", Role::Assistant);
                    self.streaming_open = true;
                }
                let _ = write!(out, "{}", chunk);
                let _ = out.flush();
                None
            }
            UiEvent::Message(message) => {
                if self.streaming_open && message.role == Role::Assistant {
                    // Already shown chunk by chunk.
                    self.end_stream_line();
                } else {
                    self.end_stream_line();
                    let _ = writeln!(io::stdout().lock(), "{}: {}", message.role, message.content);
                }
                if message.role == Role::Assistant
                    && !self.replaying_history
                    && self.awaiting_reply
                    && self.pending.is_empty()
                {
                    self.awaiting_reply = false;
                    if self.finish_after_reply {
                        return self.quit(client);
                    }
                }
                None
            }
        }
    }

    fn on_input(&mut self, line: String, client: &mut GatewayClient) -> Option<i32> {
        let line = line.trim();
        match line.split_once(' ').map_or((line, ""), |(cmd, rest)| (cmd, rest.trim())) {
            ("", _) => None,
            ("/quit", _) => self.quit(client),
            ("/abort", _) => {
                client.abort_message();
                self.awaiting_reply = false;
                None
            }
            ("/model", name) => {
                self.model = (!name.is_empty()).then(|| name.to_string());
                eprintln!("model: {}", self.model.as_deref().unwrap_or("(gateway default)"));
                None
            }
            _ => {
                if self.connected {
                    client.send_message(line, self.model.as_deref());
                    self.awaiting_reply = true;
                } else {
                    self.queue(line.to_string());
                }
                None
            }
        }
    }

    fn on_input_closed(&mut self, client: &mut GatewayClient) -> Option<i32> {
        if self.awaiting_reply {
            self.finish_after_reply = true;
            None
        } else {
            self.quit(client)
        }
    }

    fn quit(&mut self, client: &mut GatewayClient) -> Option<i32> {
        self.quitting = true;
        if client.status() == ConnectionStatus::Disconnected {
            return Some(0);
        }
        client.disconnect();
        None
    }

    fn end_stream_line(&mut self) {
        if self.streaming_open {
            let _ = writeln!(io::stdout().lock());
            self.streaming_open = false;
        }
    }
}
