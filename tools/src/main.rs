//! ledger-runner: headless driver for the coin ledger.
//!
//! Usage:
//!   ledger-runner --seed 12345 --ticks 2000 --db run.db
//!   ledger-runner --ticks 500 --tick-ms 60000 --config ledger.json
//!   ledger-runner --ipc-mode

mod traffic;

use anyhow::{Context, Result};
use coin_ledger_core::{
    clock::{ManualClock, SystemClock, WallClock},
    command::CommandRegistry,
    config::GlobalConfig,
    engine::LedgerEngine,
    ledger_subsystem::TransactionKind,
    live_board::Scoreboard,
    session::{LocalSessions, SessionRegistry},
    store::{
        chunk_by_byte_size, AttributeOwner, AttributeStore, WorldAttributes, DEFAULT_CHUNK_BYTES,
    },
    types::Tick,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::rc::Rc;
use traffic::Traffic;

const EVENT_TYPES: &[&str] = &[
    "live_identity_reset",
    "sync_seeded",
    "live_overridden",
    "durable_pushed",
    "live_pulled",
    "reconcile_failed",
    "anomaly_flagged",
    "logs_purged",
];

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Tick {
        count: u64,
    },
    Connect {
        account: String,
        #[serde(default)]
        admin: bool,
    },
    Disconnect {
        account: String,
    },
    Chat {
        account: String,
        line: String,
    },
    Record {
        account: String,
        item: String,
        price: f64,
        kind: TransactionKind,
    },
    SetLive {
        account: String,
        value: i64,
    },
    Quit,
}

#[derive(serde::Serialize)]
struct AccountView {
    name:       String,
    durable:    i64,
    live:       Option<i64>,
    privileged: bool,
}

#[derive(serde::Serialize)]
struct UiState {
    tick:         Tick,
    paused:       bool,
    now:          String,
    accounts:     Vec<AccountView>,
    ledger_len:   usize,
    world_bytes:  usize,
    reply:        Option<String>,
}

/// Everything the runner owns besides the engine itself.
struct Host {
    board:    Rc<Scoreboard>,
    sessions: Rc<LocalSessions>,
    manual:   Option<Rc<ManualClock>>,
    tick_ms:  i64,
    commands: CommandRegistry,
}

impl Host {
    /// Advance simulated wall time by one tick, then tick the engine.
    fn tick(&self, engine: &mut LedgerEngine, count: u64) -> Result<()> {
        for _ in 0..count {
            if let Some(clock) = &self.manual {
                clock.advance(self.tick_ms);
            }
            engine.run_ticks(1)?;
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let ticks = parse_arg(&args, "--ticks", 1_000u64);
    let tick_ms = parse_arg(&args, "--tick-ms", 1_000i64);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let realtime = args.iter().any(|a| a == "--realtime");
    let db = str_arg(&args, "--db").unwrap_or(":memory:");
    let config_path = str_arg(&args, "--config");

    let run_id = format!("run-{}", uuid::Uuid::new_v4());

    if !ipc_mode {
        println!("Coin ledger: ledger-runner");
        println!("  run_id:    {run_id}");
        println!("  seed:      {seed}");
        println!("  ticks:     {ticks}");
        println!("  tick_ms:   {tick_ms}");
        println!("  db:        {db}");
        println!("  clock:     {}", if realtime { "system" } else { "simulated" });
        println!();
    }

    let store = if db == ":memory:" {
        AttributeStore::in_memory()?
    } else {
        AttributeStore::open(db).with_context(|| format!("opening {db}"))?
    };
    store.migrate()?;
    let store = Rc::new(store);

    let (wall, manual): (Rc<dyn WallClock>, Option<Rc<ManualClock>>) = if realtime {
        let wall: Rc<dyn WallClock> = Rc::new(SystemClock);
        (wall, None)
    } else {
        let clock = Rc::new(ManualClock::new(SystemClock.now_millis()));
        let wall: Rc<dyn WallClock> = clock.clone();
        (wall, Some(clock))
    };

    let world = WorldAttributes::new(store.clone());
    let config = match config_path {
        Some(path) => {
            let config = GlobalConfig::from_file(path)?;
            config.save(&world)?;
            log::info!("config overrides loaded from {path}");
            config
        }
        None => GlobalConfig::load_or_init(&world),
    };

    let board = Rc::new(Scoreboard::new(&config.sync.objective_id));
    let sessions = Rc::new(LocalSessions::new());
    let admin_tag = config.sync.privileged_tag.clone();
    let mut engine = LedgerEngine::new(
        run_id.clone(),
        config,
        store.clone(),
        board.clone(),
        sessions.clone(),
        wall,
    );
    let host = Host {
        board,
        sessions,
        manual,
        tick_ms,
        commands: CommandRegistry::builtin(),
    };

    if ipc_mode {
        run_ipc_loop(&mut engine, &host)?;
    } else {
        let mut traffic = Traffic::new(seed);
        traffic.populate(&host.sessions, &host.board, &admin_tag);
        for _ in 0..ticks {
            traffic.step(&mut engine, &host.sessions, &host.board);
            host.tick(&mut engine, 1)?;
        }
        print_summary(&engine, &host, &traffic, ticks)?;
    }

    Ok(())
}

fn run_ipc_loop(engine: &mut LedgerEngine, host: &Host) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        let reply = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetState => None,
            IpcCommand::Tick { count } => {
                host.tick(engine, count)?;
                None
            }
            IpcCommand::Connect { account, admin } => {
                host.sessions.connect(&account);
                host.board.register(&account);
                if admin {
                    host.sessions.add_tag(&account, &engine.config.sync.privileged_tag);
                }
                None
            }
            IpcCommand::Disconnect { account } => {
                host.sessions.disconnect(&account);
                None
            }
            IpcCommand::Chat { account, line } => host.commands.dispatch(engine, &account, &line),
            IpcCommand::Record { account, item, price, kind } => {
                match engine.record(&account, &item, price, kind) {
                    Ok(tx) => Some(serde_json::to_string(&tx)?),
                    Err(e) => Some(format!("record rejected: {e}")),
                }
            }
            IpcCommand::SetLive { account, value } => {
                host.board.external_set(&account, value);
                None
            }
        };

        let state = build_ui_state(engine, host, reply)?;
        writeln!(stdout, "{}", serde_json::to_string(&state)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn build_ui_state(engine: &LedgerEngine, host: &Host, reply: Option<String>) -> Result<UiState> {
    let accounts = host
        .sessions
        .connected()
        .into_iter()
        .map(|s| AccountView {
            durable:    engine.currency.get_balance(&s.name),
            live:       host.board.score_of(&s.name),
            privileged: engine.currency.is_privileged(&s),
            name:       s.name,
        })
        .collect();

    Ok(UiState {
        tick: engine.clock.current_tick,
        paused: engine.clock.paused,
        now: format_millis(engine.now_millis()),
        accounts,
        ledger_len: engine.ledger.all_history().len(),
        world_bytes: engine.world().total_byte_size()?,
        reply,
    })
}

fn print_summary(engine: &LedgerEngine, host: &Host, traffic: &Traffic, ticks: u64) -> Result<()> {
    let run_id = &engine.run_id;
    let stats = traffic.stats;

    println!("=== RUN SUMMARY ===");
    println!("  run_id:          {run_id}");
    println!("  ticks run:       {ticks}");
    println!("  final tick:      {}", engine.clock.current_tick);
    println!("  wall time:       {}", format_millis(engine.now_millis()));
    println!("  joins / leaves:  {} / {}", stats.joins, stats.leaves);
    println!("  deposits:        {}", stats.deposits);
    println!("  purchases:       {}", stats.purchases);
    println!("  transfers:       {}", stats.transfers);
    println!("  chat lines:      {}", stats.chat_lines);
    println!("  external writes: {}", stats.external_writes);

    println!();
    println!("=== EVENTS ===");
    for event_type in EVENT_TYPES {
        let count = engine.store.event_count(run_id, event_type)?;
        println!("  {event_type:<20} {count}");
    }

    println!();
    println!("=== ACCOUNTS (connected) ===");
    for session in host.sessions.connected() {
        let durable = engine.currency.get_balance(&session.name);
        let live = host
            .board
            .score_of(&session.name)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".into());
        let marker = if engine.currency.is_privileged(&session) { " *" } else { "" };
        println!("  {:<12} durable {durable:>8} | live {live:>8}{marker}", session.name);
    }

    println!();
    println!("=== LEDGER ===");
    let records = engine.ledger.all_history();
    let chunks = chunk_by_byte_size(&records, DEFAULT_CHUNK_BYTES)?;
    println!("  records:         {}", records.len());
    println!("  export chunks:   {}", chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let bytes = serde_json::to_string(chunk)?.len();
        println!("    #{:<3} {:>5} records  ~{bytes} bytes", i + 1, chunk.len());
    }

    let world = engine.world();
    println!();
    println!("=== WORLD STORE ===");
    println!("  keys:            {}", world.list_keys()?.join(", "));
    println!("  total bytes:     {}", world.total_byte_size()?);
    Ok(())
}

fn format_millis(millis: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
