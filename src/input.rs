//! Key bindings of the dashboard.
use crossterm::event::KeyCode;
use tokio::sync::mpsc;

use crate::poller::Command;
use crate::settings::Settings;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Quit,
    ToggleTheme,
    Send(Command),
}

/// Maps a key to an action. Commands are built from `settings` without
/// changing it; see [`dispatch`].
pub fn action_for(code: KeyCode, settings: &Settings) -> Option<Action> {
    let action = match code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('t') => Action::ToggleTheme,
        KeyCode::Char('n') => Action::Send(Command::SwitchNetwork(settings.network.toggled())),
        KeyCode::Char('a') => {
            let thresholds = settings.thresholds();
            Action::Send(Command::SetThresholds(thresholds.with_enabled(!thresholds.enabled)))
        }
        KeyCode::Char('i') => Action::Send(Command::SetKlineInterval(settings.kline_interval.next())),
        KeyCode::Char('r') => Action::Send(Command::RefreshAll),
        _ => return None,
    };
    Some(action)
}

/// Hands `command` to the poller and, only if it was accepted, records it in
/// `settings`. Returns whether `settings` changed.
pub fn dispatch(commands: &mpsc::Sender<Command>, command: Command, settings: &mut Settings) -> bool {
    if let Err(e) = commands.try_send(command.clone()) {
        tracing::warn!(error = %e, ?command, "poller did not accept command");
        return false;
    }
    match command {
        Command::SwitchNetwork(network) => settings.network = network,
        Command::SetThresholds(thresholds) => settings.set_thresholds(&thresholds),
        Command::SetKlineInterval(interval) => settings.kline_interval = interval,
        Command::RefreshAll => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::KlineInterval;
    use crate::network::Network;

    #[test]
    fn keys_build_commands_from_current_settings() {
        let settings = Settings::default();
        assert_eq!(
            action_for(KeyCode::Char('n'), &settings),
            Some(Action::Send(Command::SwitchNetwork(Network::Testnet)))
        );
        assert_eq!(
            action_for(KeyCode::Char('i'), &settings),
            Some(Action::Send(Command::SetKlineInterval(KlineInterval::Day.next())))
        );
        match action_for(KeyCode::Char('a'), &settings) {
            Some(Action::Send(Command::SetThresholds(t))) => assert!(!t.enabled),
            other => panic!("unexpected action {other:?}"),
        }
        assert_eq!(action_for(KeyCode::Esc, &settings), Some(Action::Quit));
        assert_eq!(action_for(KeyCode::Char('x'), &settings), None);
    }

    #[tokio::test]
    async fn accepted_command_updates_settings() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut settings = Settings::default();

        assert!(dispatch(&tx, Command::SwitchNetwork(Network::Testnet), &mut settings));
        assert_eq!(settings.network, Network::Testnet);
        assert_eq!(rx.recv().await, Some(Command::SwitchNetwork(Network::Testnet)));

        assert!(!dispatch(&tx, Command::RefreshAll, &mut settings));
        assert_eq!(rx.recv().await, Some(Command::RefreshAll));
    }

    #[tokio::test]
    async fn rejected_command_leaves_settings_alone() {
        let (tx, _rx) = mpsc::channel(1);
        tx.try_send(Command::RefreshAll).unwrap();
        let mut settings = Settings::default();

        assert!(!dispatch(&tx, Command::SwitchNetwork(Network::Testnet), &mut settings));
        assert!(!dispatch(&tx, Command::SetKlineInterval(KlineInterval::Hour), &mut settings));
        assert_eq!(settings, Settings::default());
    }
}
