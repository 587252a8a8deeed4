use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use eyre::{Result, WrapErr, eyre};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{
    fs::OpenOptions,
    io::{Stdout, stdout},
    sync::Mutex,
    time::Duration,
};
use tokio::{sync::mpsc, time};
use tracing_subscriber::EnvFilter;

use mantlesight::{
    alert::{AlertThresholds, LogNotifier},
    config::{Cli, Commands},
    input::{self, Action},
    market::{BybitMarketClient, PricePairs},
    network::{Endpoints, Network, create_client},
    poller::Poller,
    probe::probe_network,
    settings::{Settings, SettingsStore},
    ui::Dashboard,
};

type CrosstermTerminal = Terminal<CrosstermBackend<Stdout>>;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::load();
    init_tracing(&cli)?;

    let loaded = SettingsStore::new(&cli.settings);
    let (mut settings, store) = match loaded.load() {
        Ok(settings) => (settings, Some(loaded)),
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "using default settings, the file will not be overwritten");
            (Settings::default(), None)
        }
    };
    apply_overrides(&cli, &mut settings)?;

    let endpoints = Endpoints {
        rpc_override: cli.rpc_url.clone().map(|url| (settings.network, url)),
    };

    match cli.command {
        Some(Commands::Probe { all_networks }) => {
            let market = BybitMarketClient::new(PricePairs::default());
            let networks = if all_networks {
                vec![Network::Mainnet, Network::Testnet]
            } else {
                vec![settings.network]
            };
            for network in networks {
                let client = create_client(network, &endpoints);
                probe_network(&client, &market, cli.tps_window).await;
            }
            Ok(())
        }
        None => {
            persist(store.as_ref(), &settings);
            run_dashboard(settings, store, endpoints, cli.tps_window).await
        }
    }
}

/// Probe output goes to stderr; the dashboard owns the terminal, so it logs
/// to a file.
fn init_tracing(cli: &Cli) -> Result<()> {
    if cli.command.is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cli.log_file)
        .wrap_err_with(|| format!("opening log file {}", cli.log_file.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn persist(store: Option<&SettingsStore>, settings: &Settings) {
    if let Some(store) = store {
        if let Err(e) = store.save(settings) {
            tracing::warn!(error = %e, "could not persist settings");
        }
    }
}

/// CLI flags win over persisted settings.
fn apply_overrides(cli: &Cli, settings: &mut Settings) -> Result<()> {
    if let Some(network) = cli.network {
        settings.network = network;
    }
    let current = settings.thresholds();
    let thresholds = AlertThresholds::new(
        cli.high_gwei.unwrap_or(current.high_gwei()),
        cli.low_gwei.unwrap_or(current.low_gwei()),
        current.enabled && !cli.no_alerts,
    )
    .map_err(|e| eyre!("invalid alert thresholds: {e}"))?;
    settings.set_thresholds(&thresholds);
    Ok(())
}

async fn run_dashboard(
    mut settings: Settings,
    store: Option<SettingsStore>,
    endpoints: Endpoints,
    tps_window: u64,
) -> Result<()> {
    let pairs = PricePairs::default();
    let mut dashboard = Dashboard::new(settings.theme, pairs.counter_label.clone());

    let (mut poller, snapshots) = Poller::new(
        move |network| create_client(network, &endpoints),
        settings.network,
        BybitMarketClient::new(pairs),
        settings.thresholds(),
        tps_window,
        Box::new(LogNotifier),
    );
    poller.set_kline_interval(settings.kline_interval);

    let (commands, command_rx) = mpsc::channel(16);
    let poller_task = tokio::spawn(poller.run(command_rx));

    let mut terminal = setup_terminal()?;

    loop {
        {
            let metrics = snapshots.borrow();
            terminal.draw(|frame| dashboard.render(frame, &metrics))?;
        }

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match input::action_for(key.code, &settings) {
                    Some(Action::Quit) => dashboard.quit(),
                    Some(Action::ToggleTheme) => {
                        settings.theme = settings.theme.toggled();
                        dashboard.theme = settings.theme;
                        persist(store.as_ref(), &settings);
                    }
                    Some(Action::Send(command)) => {
                        if input::dispatch(&commands, command, &mut settings) {
                            persist(store.as_ref(), &settings);
                        }
                    }
                    None => continue,
                }
            }
        }

        if dashboard.should_quit {
            break;
        }

        time::sleep(Duration::from_millis(50)).await;
    }

    cleanup_terminal(&mut terminal)?;
    drop(commands);
    if let Err(e) = poller_task.await {
        tracing::error!(error = %e, "poller task ended abnormally");
    }
    println!("Goodbye!");
    Ok(())
}

fn setup_terminal() -> Result<CrosstermTerminal> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn cleanup_terminal(terminal: &mut CrosstermTerminal) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}
