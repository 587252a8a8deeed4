use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Sparkline, Wrap},
};
use std::time::{Duration, Instant};

use crate::config::STALE_AFTER;
use crate::data::{Candle, market_cap};
use crate::settings::Theme;
use crate::state::{ConnectionStatus, FetchState, MetricsStore};

struct Palette {
    fg: Color,
    subtle: Color,
    accent: Color,
    up: Color,
    down: Color,
    warn: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                fg: Color::White,
                subtle: Color::DarkGray,
                accent: Color::Cyan,
                up: Color::Green,
                down: Color::Red,
                warn: Color::Yellow,
            },
            Theme::Light => Self {
                fg: Color::Black,
                subtle: Color::Gray,
                accent: Color::Blue,
                up: Color::Rgb(0x26, 0xa6, 0x9a),
                down: Color::Rgb(0xef, 0x53, 0x50),
                warn: Color::Rgb(0xb2, 0x6a, 0x00),
            },
        }
    }
}

pub struct Dashboard {
    pub should_quit: bool,
    pub theme: Theme,
    pub counter_label: String,
}

impl Dashboard {
    pub fn new(theme: Theme, counter_label: String) -> Self {
        Self {
            should_quit: false,
            theme,
            counter_label,
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn render(&self, frame: &mut Frame, metrics: &MetricsStore) {
        let palette = Palette::for_theme(self.theme);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // connection
                Constraint::Length(4), // price / block / txs
                Constraint::Length(4), // market cap / batches
                Constraint::Length(4), // gas
                Constraint::Min(8),    // klines
                Constraint::Length(3), // toast
                Constraint::Length(3), // help
            ])
            .split(frame.area());

        self.render_connection_status(frame, chunks[0], metrics, &palette);
        self.render_top_row(frame, chunks[1], metrics, &palette);
        self.render_second_row(frame, chunks[2], metrics, &palette);
        self.render_gas(frame, chunks[3], metrics, &palette);
        self.render_klines(frame, chunks[4], metrics, &palette);
        self.render_toast(frame, chunks[5], metrics, &palette);
        self.render_help(frame, chunks[6], &palette);
    }

    fn render_connection_status(&self, frame: &mut Frame, area: Rect, metrics: &MetricsStore, p: &Palette) {
        let status_text = match &metrics.connection_status {
            ConnectionStatus::Connected => "Connected".to_string(),
            ConnectionStatus::Stale => "Stale".to_string(),
            ConnectionStatus::Disconnected => "Disconnected".to_string(),
            ConnectionStatus::Error(err) => format!("Error: {}", err),
        };

        let status_style = match &metrics.connection_status {
            ConnectionStatus::Connected => Style::default().fg(p.up),
            ConnectionStatus::Stale => Style::default().fg(p.warn),
            ConnectionStatus::Disconnected | ConnectionStatus::Error(_) => Style::default().fg(p.down),
        };

        let last_update = fmt_last_update(metrics.last_updated, Instant::now());

        let mut line_parts = vec![
            Span::styled("Status: ", Style::default().fg(p.fg)),
            Span::styled(status_text, status_style),
            Span::styled(" | ", Style::default().fg(p.fg)),
            Span::styled(
                format!("{} ({})", metrics.network.name(), metrics.network.chain_id()),
                Style::default().fg(p.accent),
            ),
            Span::styled(" | RPC: ", Style::default().fg(p.fg)),
            Span::styled(&metrics.rpc_url, Style::default().fg(p.accent)),
            Span::styled(" | Updated: ", Style::default().fg(p.fg)),
            Span::styled(last_update, Style::default().fg(p.warn)),
        ];

        if matches!(metrics.connection_status, ConnectionStatus::Stale) {
            line_parts.push(Span::styled(" | Stale > ", Style::default().fg(p.fg)));
            line_parts.push(Span::styled(
                format!("{}s", STALE_AFTER.as_secs()),
                Style::default().fg(p.warn),
            ));
        }

        let paragraph = Paragraph::new(vec![Line::from(line_parts)])
            .block(Block::default().title("Connection").borders(Borders::ALL))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_top_row(&self, frame: &mut Frame, area: Rect, metrics: &MetricsStore, p: &Palette) {
        let cols = three_columns(area);

        let quote = metrics.price.value();
        let usd = quote.and_then(|q| q.usd);
        let price_line = Line::from(vec![Span::styled(
            usd.map(|v| format!("${v:.4}")).unwrap_or_else(|| "--".to_string()),
            Style::default().fg(p.fg).add_modifier(Modifier::BOLD),
        )]);
        let mut detail = vec![Span::styled(
            format!(
                "@ {} {}",
                quote
                    .and_then(|q| q.counter_asset_price)
                    .map(|v| format!("{v:.8}"))
                    .unwrap_or_else(|| "--".to_string()),
                self.counter_label
            ),
            Style::default().fg(p.subtle),
        )];
        if let Some(change) = quote.and_then(|q| q.change_24h_pct) {
            let style = if change >= 0.0 { p.up } else { p.down };
            detail.push(Span::styled(format!("  {}", fmt_change(change)), Style::default().fg(style)));
        }
        card(frame, cols[0], "MNT Price", vec![price_line, Line::from(detail)], &metrics.price);

        let block_text = metrics
            .block
            .value()
            .map(|b| b.block_number.to_string())
            .unwrap_or_else(|| "--".to_string());
        let block_time = metrics
            .block_time_sec
            .map(|t| format!("({t:.2}s)"))
            .unwrap_or_default();
        card(
            frame,
            cols[1],
            "Latest Block",
            vec![
                Line::from(Span::styled(block_text, Style::default().fg(p.up))),
                Line::from(Span::styled(block_time, Style::default().fg(p.subtle))),
            ],
            &metrics.block,
        );

        let tps = metrics.tps.value();
        card(
            frame,
            cols[2],
            &format!("Transactions ({} blocks)", metrics.tps_window),
            vec![
                Line::from(Span::styled(
                    tps.map(|s| fmt_tx_count(s.total_txs)).unwrap_or_else(|| "--".to_string()),
                    Style::default().fg(p.fg),
                )),
                Line::from(Span::styled(
                    tps.map(|s| format!("({:.1} TPS)", s.tps)).unwrap_or_default(),
                    Style::default().fg(p.subtle),
                )),
            ],
            &metrics.tps,
        );
    }

    fn render_second_row(&self, frame: &mut Frame, area: Rect, metrics: &MetricsStore, p: &Palette) {
        let cols = three_columns(area);

        let cap = metrics.market_cap.or_else(|| {
            market_cap(
                metrics.price.value().and_then(|q| q.usd),
                metrics.supply.value().copied(),
            )
        });
        card(
            frame,
            cols[0],
            "Market Cap",
            vec![
                Line::from(Span::styled(
                    cap.map(|c| format!("${}", fmt_thousands(c))).unwrap_or_else(|| "--".to_string()),
                    Style::default().fg(p.fg),
                )),
                Line::from(Span::styled(
                    cap.map(|c| format!("({:.2} B)", c / 1_000_000_000.0)).unwrap_or_default(),
                    Style::default().fg(p.subtle),
                )),
            ],
            &metrics.supply,
        );

        let rollup = metrics.rollup.value();
        let batch = |v: Option<u64>| v.map(|n| n.to_string()).unwrap_or_else(|| "--".to_string());
        card(
            frame,
            cols[1],
            "Latest L1 Txn Batch",
            vec![Line::from(Span::styled(
                batch(rollup.and_then(|r| r.l1_txn_batch)),
                Style::default().fg(p.accent),
            ))],
            &metrics.rollup,
        );
        card(
            frame,
            cols[2],
            "Latest L1 State Batch",
            vec![Line::from(Span::styled(
                batch(rollup.and_then(|r| r.l1_state_batch)),
                Style::default().fg(p.accent),
            ))],
            &metrics.rollup,
        );
    }

    fn render_gas(&self, frame: &mut Frame, area: Rect, metrics: &MetricsStore, p: &Palette) {
        let t = &metrics.thresholds;
        let gwei = metrics.gas.value().map(|g| g.gwei());
        let gas_style = match gwei {
            Some(v) if t.enabled && v > t.high_gwei() => Style::default().fg(p.down),
            Some(v) if t.enabled && v < t.low_gwei() => Style::default().fg(p.warn),
            Some(_) => Style::default().fg(p.up),
            None => Style::default().fg(p.subtle),
        };

        let mut lines = vec![Line::from(vec![
            Span::styled("Gas: ", Style::default().fg(p.fg)),
            Span::styled(
                gwei.map(|g| format!("{g:.3} Gwei")).unwrap_or_else(|| "N/A".to_string()),
                gas_style,
            ),
        ])];
        let alert_state = if t.enabled { "on" } else { "off" };
        lines.push(Line::from(vec![
            Span::styled("Alerts: ", Style::default().fg(p.fg)),
            Span::styled(alert_state, Style::default().fg(p.accent)),
            Span::styled(
                format!("  |  High > {} Gwei  |  Low < {} Gwei", t.high_gwei(), t.low_gwei()),
                Style::default().fg(p.subtle),
            ),
        ]));

        let paragraph = Paragraph::new(lines)
            .block(Block::default().title(status_title("Gas", &metrics.gas)).borders(Borders::ALL));
        frame.render_widget(paragraph, area);
    }

    fn render_klines(&self, frame: &mut Frame, area: Rect, metrics: &MetricsStore, p: &Palette) {
        let title = format!("MNT/USDT {} (i: change interval)", metrics.kline_interval);
        let block = Block::default()
            .title(status_title(&title, &metrics.klines))
            .borders(Borders::ALL);

        let Some(candles) = metrics.klines.value().filter(|c| !c.is_empty()) else {
            let msg = match &metrics.klines {
                FetchState::Failed { error, .. } => error.clone(),
                FetchState::Idle | FetchState::Fetching { .. } => "Loading...".to_string(),
                FetchState::Settled(_) => "No data".to_string(),
            };
            let paragraph = Paragraph::new(Line::from(Span::styled(msg, Style::default().fg(p.subtle))))
                .block(block);
            frame.render_widget(paragraph, area);
            return;
        };

        let inner = block.inner(area);
        frame.render_widget(block, area);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);

        let first = candles.first();
        let last = candles.last();
        let trend_up = matches!((first, last), (Some(f), Some(l)) if l.close >= f.open);
        let series = close_series(candles);
        let sparkline = Sparkline::default()
            .data(&series)
            .style(Style::default().fg(if trend_up { p.up } else { p.down }));
        frame.render_widget(sparkline, rows[0]);

        if let Some(c) = last {
            let style = Style::default().fg(if c.is_up() { p.up } else { p.down });
            let summary = Line::from(vec![
                Span::styled("O ", Style::default().fg(p.subtle)),
                Span::styled(format!("{:.4}", c.open), style),
                Span::styled("  H ", Style::default().fg(p.subtle)),
                Span::styled(format!("{:.4}", c.high), style),
                Span::styled("  L ", Style::default().fg(p.subtle)),
                Span::styled(format!("{:.4}", c.low), style),
                Span::styled("  C ", Style::default().fg(p.subtle)),
                Span::styled(format!("{:.4}", c.close), style),
                Span::styled(format!("  V {:.0}", c.volume), Style::default().fg(p.subtle)),
            ]);
            frame.render_widget(Paragraph::new(summary), rows[1]);
        }
    }

    fn render_toast(&self, frame: &mut Frame, area: Rect, metrics: &MetricsStore, p: &Palette) {
        let (title, line) = match metrics.visible_toast(Instant::now()) {
            Some(msg) => (
                "ALERT",
                Line::from(Span::styled(msg.to_string(), Style::default().fg(p.down).add_modifier(Modifier::BOLD))),
            ),
            None => (
                "Status",
                Line::from(vec![
                    Span::styled("Block ", Style::default().fg(p.subtle)),
                    Span::styled(
                        metrics
                            .block
                            .value()
                            .map(|b| format!("#{}", b.block_number))
                            .unwrap_or_else(|| "--".to_string()),
                        Style::default().fg(p.fg),
                    ),
                    Span::styled("  |  Explorer: ", Style::default().fg(p.subtle)),
                    Span::styled(metrics.network.explorer_url(), Style::default().fg(p.accent)),
                ]),
            ),
        };
        let paragraph = Paragraph::new(line).block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(paragraph, area);
    }

    fn render_help(&self, frame: &mut Frame, area: Rect, p: &Palette) {
        let key = |k: &'static str| Span::styled(k, Style::default().fg(p.warn));
        let text = |t: &'static str| Span::styled(t, Style::default().fg(p.fg));
        let help = Line::from(vec![
            key("q"),
            text(" quit  "),
            key("n"),
            text(" network  "),
            key("t"),
            text(" theme  "),
            key("a"),
            text(" alerts  "),
            key("i"),
            text(" kline interval  "),
            key("r"),
            text(" refresh"),
        ]);
        let paragraph = Paragraph::new(help).block(Block::default().title("Help").borders(Borders::ALL));
        frame.render_widget(paragraph, area);
    }
}

fn three_columns(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(11, 31),
            Constraint::Ratio(10, 31),
            Constraint::Ratio(10, 31),
        ])
        .split(area)
}

fn card<T>(frame: &mut Frame, area: Rect, title: &str, lines: Vec<Line>, state: &FetchState<T>) {
    let paragraph = Paragraph::new(lines)
        .block(Block::default().title(status_title(title, state)).borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

/// Card title with a marker for in-progress or failed fetches.
fn status_title<T>(title: &str, state: &FetchState<T>) -> String {
    match state {
        FetchState::Fetching { .. } => format!("{title} ~"),
        FetchState::Failed { .. } => format!("{title} !"),
        FetchState::Idle | FetchState::Settled(_) => title.to_string(),
    }
}

/// Closing prices rescaled onto `0..=1000` for the sparkline.
pub fn close_series(candles: &[Candle]) -> Vec<u64> {
    let lo = candles.iter().map(|c| c.close).fold(f64::INFINITY, f64::min);
    let hi = candles.iter().map(|c| c.close).fold(f64::NEG_INFINITY, f64::max);
    let range = if hi > lo { hi - lo } else { 1.0 };
    candles
        .iter()
        .map(|c| (((c.close - lo) / range) * 1000.0).round() as u64)
        .collect()
}

pub fn fmt_change(pct: f64) -> String {
    let sign = if pct >= 0.0 { "+" } else { "" };
    format!("{sign}{pct:.2}%")
}

pub fn fmt_tx_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.2} M", n as f64 / 1_000_000.0)
    } else {
        n.to_string()
    }
}

/// `1234567.891` -> `1,234,567.89`
pub fn fmt_thousands(v: f64) -> String {
    let s = format!("{:.2}", v.abs());
    let (int, frac) = s.split_once('.').unwrap_or((s.as_str(), "00"));
    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if v < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

/// Age of the last applied outcome, `--` before the first one.
pub fn fmt_last_update(last: Option<Instant>, now: Instant) -> String {
    match last.map(|t| now.saturating_duration_since(t)) {
        None => "--".to_string(),
        Some(elapsed) if elapsed < Duration::from_secs(1) => "< 1s ago".to_string(),
        Some(elapsed) => format!("{}s ago", elapsed.as_secs()),
    }
}
