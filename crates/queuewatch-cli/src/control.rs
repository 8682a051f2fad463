//! Commands accepted on stdin while the watcher runs

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Run a check now (dropped if one is in flight)
    CheckNow,
    /// Change the polling interval, in minutes
    SetInterval(u32),
    /// Re-read config and apply its polling interval
    Reload,
    TestNotify,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "commands: check | interval <minutes> | reload | test | status | help | quit";

/// Parse one input line; blank lines yield `None`
pub fn parse(line: &str) -> Result<Option<ControlCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };

    let parsed = match command.to_lowercase().as_str() {
        "check" | "now" => ControlCommand::CheckNow,
        "interval" => {
            let raw = words
                .next()
                .ok_or_else(|| "usage: interval <minutes>".to_string())?;
            let minutes: u32 = raw
                .parse()
                .map_err(|_| format!("invalid number of minutes: {}", raw))?;
            if minutes == 0 {
                return Err("interval must be at least 1 minute".to_string());
            }
            ControlCommand::SetInterval(minutes)
        }
        "reload" => ControlCommand::Reload,
        "test" => ControlCommand::TestNotify,
        "status" => ControlCommand::Status,
        "help" | "?" => ControlCommand::Help,
        "quit" | "exit" => ControlCommand::Quit,
        other => return Err(format!("unknown command '{}'; {}", other, HELP)),
    };

    if words.next().is_some() {
        return Err(format!("unexpected arguments after '{}'", command));
    }
    Ok(Some(parsed))
}
