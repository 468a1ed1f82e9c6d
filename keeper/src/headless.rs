//! Line protocol for the tracker.
//!
//! One command per line; investigators are addressed by their 1-based
//! roster position. Output lines are tagged so scripts can follow along:
//! `[SIGNAL]`, `[EPISODE]`, `[PENDING]`, `[STATUS]`, `[GROUP]`, `[SKILLS]`,
//! `[SAVED]`, `[LOADED]` and `[ERROR]`.

use keeper_core::{
    Characteristic, Investigator, InvestigatorId, NoteField, Outcome, Signal, Stat, StatusKind,
    Tracker, TrackerConfig, TrackerError,
};
use std::io::{self, Write};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// What the loop should do after a command.
enum Step {
    Continue { changed: bool },
    Quit,
}

impl Step {
    fn changed() -> Self {
        Step::Continue { changed: true }
    }

    fn unchanged() -> Self {
        Step::Continue { changed: false }
    }

    fn from_outcome(outcome: &Outcome) -> Self {
        print_outcome(outcome);
        Step::Continue {
            changed: outcome.applied,
        }
    }
}

/// Run the tracker over stdin/stdout.
///
/// Scheduled re-checks fire while waiting for input.
pub async fn run_headless(config: TrackerConfig) -> Result<(), TrackerError> {
    let mut tracker = if config.fresh {
        Tracker::with_default_roster(config.rules.clone())
    } else {
        Tracker::load(&config.save_path, config.rules.clone()).await?
    };
    info!(path = %config.save_path.display(), "Keeper tracker started");

    println!("=== Keeper ===");
    println!("Roster: {}", config.save_path.display());
    println!(
        "Session: {}",
        if tracker.is_session_active() {
            "active"
        } else {
            "inactive"
        }
    );
    print_roster(&tracker);
    println!();
    println!("Type 'help' for commands.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = io::stdout();

    loop {
        let next = match tracker.next_due() {
            Some(due) => {
                tokio::select! {
                    line = lines.next_line() => line,
                    _ = tokio::time::sleep_until(tokio::time::Instant::from_std(due)) => {
                        let outcome = tracker.run_due(Instant::now());
                        if let Step::Continue { changed: true } = Step::from_outcome(&outcome) {
                            autosave(&tracker, &config).await;
                        }
                        stdout.flush().ok();
                        continue;
                    }
                }
            }
            None => lines.next_line().await,
        };

        let line = match next {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim().trim_start_matches('#');
        if line.is_empty() {
            continue;
        }

        // Anything already due goes first
        let due = tracker.run_due(Instant::now());
        if due.applied {
            Step::from_outcome(&due);
            autosave(&tracker, &config).await;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        match execute(&mut tracker, &config, &parts).await {
            Ok(Step::Quit) => {
                println!("Goodbye!");
                break;
            }
            Ok(Step::Continue { changed }) => {
                if changed {
                    print_pending(&tracker);
                    autosave(&tracker, &config).await;
                }
            }
            Err(message) => println!("[ERROR] {message}"),
        }
        stdout.flush().ok();
    }

    Ok(())
}

async fn autosave(tracker: &Tracker, config: &TrackerConfig) {
    if let Err(e) = tracker.save(&config.save_path).await {
        warn!(error = %e, "Autosave failed");
        println!("[ERROR] Save failed: {e}");
    }
}

async fn execute(
    tracker: &mut Tracker,
    config: &TrackerConfig,
    parts: &[&str],
) -> Result<Step, String> {
    let arg = |i: usize| parts.get(i).copied();
    let rest = |i: usize| parts.get(i..).map(|p| p.join(" ")).unwrap_or_default();

    match parts.first().copied() {
        Some("quit") | Some("exit") => Ok(Step::Quit),
        Some("help") => {
            print_help();
            Ok(Step::unchanged())
        }
        Some("list") => {
            print_roster(tracker);
            Ok(Step::unchanged())
        }
        Some("status") => {
            let id = investigator_arg(tracker, arg(1))?;
            if let Some(investigator) = tracker.investigator(id) {
                print_status(investigator);
            }
            Ok(Step::unchanged())
        }

        // Roster
        Some("add") => {
            let id = tracker.add_investigator();
            if let Some(investigator) = tracker.investigator(id) {
                println!("[ADDED] {}", investigator.name);
            }
            Ok(Step::changed())
        }
        Some("remove") => {
            let id = investigator_arg(tracker, arg(1))?;
            let removed = tracker.remove_investigator(id).map_err(|e| e.to_string())?;
            println!("[REMOVED] {}", removed.name);
            Ok(Step::changed())
        }
        Some("rename") => {
            let id = investigator_arg(tracker, arg(1))?;
            let name = required(rest(2), "rename <n> <name>")?;
            let changed = tracker.rename(id, name).map_err(|e| e.to_string())?;
            Ok(Step::Continue { changed })
        }
        Some("player") => {
            let id = investigator_arg(tracker, arg(1))?;
            let player = required(rest(2), "player <n> <name>")?;
            let changed = tracker.set_player(id, player).map_err(|e| e.to_string())?;
            Ok(Step::Continue { changed })
        }
        Some("note") => {
            let id = investigator_arg(tracker, arg(1))?;
            let field = match arg(2) {
                Some("skills") => NoteField::Skills,
                Some("inventory") => NoteField::Inventory,
                Some(key) if keeper_core::investigator::BACKGROUND_KEYS.contains(&key) => {
                    NoteField::Background(key.to_string())
                }
                _ => {
                    return Err(format!(
                        "Usage: note <n> skills|inventory|{} <text>",
                        keeper_core::investigator::BACKGROUND_KEYS.join("|")
                    ))
                }
            };
            let changed = tracker
                .set_note(id, field, rest(3))
                .map_err(|e| e.to_string())?;
            Ok(Step::Continue { changed })
        }

        // Skills
        Some("skill") => {
            let id = investigator_arg(tracker, arg(1))?;
            let value: i32 = arg(2)
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| "Usage: skill <n> <value> <name>".to_string())?;
            let name = required(rest(3), "skill <n> <value> <name>")?;
            let changed = tracker
                .set_skill(id, &name, value)
                .map_err(|e| e.to_string())?;
            Ok(Step::Continue { changed })
        }
        Some("unskill") => {
            let id = investigator_arg(tracker, arg(1))?;
            let name = required(rest(2), "unskill <n> <name>")?;
            let changed = tracker.remove_skill(id, &name).map_err(|e| e.to_string())?;
            Ok(Step::Continue { changed })
        }
        Some("skills") => {
            let id = investigator_arg(tracker, arg(1))?;
            let block = required(rest(2), "skills <n> <Name: value; Name: value>")?;
            let changed = tracker
                .import_skills(id, &block.replace(';', "\n"))
                .map_err(|e| e.to_string())?;
            if changed {
                if let Some(investigator) = tracker.investigator(id) {
                    println!(
                        "[SKILLS] {}: {} skill(s)",
                        investigator.name,
                        investigator.skills.len()
                    );
                }
            }
            Ok(Step::Continue { changed })
        }
        Some("check") => {
            let id = investigator_arg(tracker, arg(1))?;
            let roll: u32 = arg(2)
                .and_then(|r| r.parse().ok())
                .ok_or_else(|| "Usage: check <n> <d100> <skill>".to_string())?;
            let name = required(rest(3), "check <n> <d100> <skill>")?;
            outcome(tracker.skill_check(id, &name, roll))
        }

        // Session
        Some("session") => {
            let outcome = match arg(1) {
                Some("start") => tracker.start_session(),
                Some("end") => tracker.end_session(),
                Some("toggle") => {
                    let active = !tracker.is_session_active();
                    tracker.set_session_active(active)
                }
                _ => return Err("Usage: session start|end|toggle".to_string()),
            };
            Ok(Step::from_outcome(&outcome))
        }

        // Sheet edits
        Some("edit") => {
            let id = investigator_arg(tracker, arg(1))?;
            let stat = arg(2)
                .and_then(parse_stat)
                .ok_or_else(|| "Usage: edit <n> <stat> <modifier>".to_string())?;
            let input = required(rest(3), "edit <n> <stat> <modifier>")?;
            outcome(tracker.edit_stat(id, stat, &input))
        }

        // Check resolution
        Some("wound") => {
            let id = investigator_arg(tracker, arg(1))?;
            let passed = pass_arg(arg(2), "wound <n> pass|fail")?;
            outcome(tracker.resolve_major_wound(id, passed))
        }
        Some("temp") => {
            let id = investigator_arg(tracker, arg(1))?;
            let passed = pass_arg(arg(2), "temp <n> pass|fail")?;
            outcome(tracker.resolve_temporary_insanity(id, passed))
        }
        Some("indefinite") => {
            let id = investigator_arg(tracker, arg(1))?;
            outcome(tracker.confirm_indefinite_insanity(id))
        }
        Some("dying") => {
            let id = investigator_arg(tracker, arg(1))?;
            let passed = pass_arg(arg(2), "dying <n> pass|fail")?;
            outcome(tracker.resolve_dying(id, passed))
        }
        Some("recover") => {
            let id = investigator_arg(tracker, arg(1))?;
            outcome(tracker.request_recovery(id))
        }
        Some("latent") => {
            let id = investigator_arg(tracker, arg(1))?;
            let latent = match arg(2) {
                Some("yes") => true,
                Some("no") => false,
                _ => return Err("Usage: latent <n> yes|no".to_string()),
            };
            outcome(tracker.confirm_recovery(id, latent))
        }
        Some("stabilize") => {
            let id = investigator_arg(tracker, arg(1))?;
            outcome(tracker.stabilize(id))
        }
        Some("destabilize") => {
            let id = investigator_arg(tracker, arg(1))?;
            outcome(tracker.destabilize(id))
        }
        Some("clear") => {
            let id = investigator_arg(tracker, arg(1))?;
            let status = arg(2).and_then(parse_status).ok_or_else(|| {
                "Usage: clear <n> wound|unconscious|temporary|indefinite|latent".to_string()
            })?;
            outcome(tracker.clear_status(id, status))
        }

        Some("group") => group(tracker, parts),

        // Files
        Some("save") => {
            let path = arg(1)
                .map(std::path::PathBuf::from)
                .unwrap_or_else(|| config.save_path.clone());
            tracker.save(&path).await.map_err(|e| e.to_string())?;
            println!("[SAVED] Roster saved to {}", path.display());
            Ok(Step::unchanged())
        }
        Some("load") => {
            let path = arg(1)
                .map(std::path::PathBuf::from)
                .unwrap_or_else(|| config.save_path.clone());
            *tracker = Tracker::load(&path, config.rules.clone())
                .await
                .map_err(|e| e.to_string())?;
            println!("[LOADED] Roster loaded from {}", path.display());
            print_roster(tracker);
            Ok(Step::changed())
        }

        _ => Err("Unknown command. Type 'help' for help.".to_string()),
    }
}

fn group(tracker: &mut Tracker, parts: &[&str]) -> Result<Step, String> {
    const USAGE: &str =
        "Usage: group open|losses <success> <failure>|roll <n> <d100>|start|loss <amount>|resume|cancel|status";

    match parts.get(1).copied() {
        Some("open") => {
            tracker.open_group_check().map_err(|e| e.to_string())?;
            println!("[GROUP] Collecting inputs. Set 'group losses' and a 'group roll' for each living investigator.");
            for (index, investigator) in tracker.investigators().iter().enumerate() {
                if investigator.is_alive() {
                    println!("  {}. {}", index + 1, investigator.name);
                }
            }
            Ok(Step::unchanged())
        }
        Some("losses") => {
            let (Some(success), Some(failure)) = (parts.get(2), parts.get(3)) else {
                return Err("Usage: group losses <success> <failure>".to_string());
            };
            tracker
                .set_group_losses(*success, *failure)
                .map_err(|e| e.to_string())?;
            println!("[GROUP] Losses: success {success}, failure {failure}");
            Ok(Step::unchanged())
        }
        Some("roll") => {
            let id = investigator_arg(tracker, parts.get(2).copied())?;
            let roll: u32 = parts
                .get(3)
                .and_then(|r| r.parse().ok())
                .ok_or_else(|| "Usage: group roll <n> <d100>".to_string())?;
            tracker.set_group_roll(id, roll).map_err(|e| e.to_string())?;
            Ok(Step::unchanged())
        }
        Some("start") => outcome(tracker.start_group_check()),
        Some("loss") => {
            let loss: i32 = parts
                .get(2)
                .and_then(|l| l.parse().ok())
                .ok_or_else(|| "Usage: group loss <amount>".to_string())?;
            outcome(tracker.confirm_group_loss(loss))
        }
        Some("resume") => outcome(tracker.resume_group_check()),
        Some("cancel") => Ok(Step::from_outcome(&tracker.cancel_group_check())),
        Some("status") => {
            let group = tracker.group();
            println!("[GROUP] {}", group.state().name());
            if let Some(turn) = group.turn() {
                if let Some(investigator) = tracker.investigator(turn.investigator) {
                    let sanity = investigator.sanity.current;
                    println!(
                        "  Turn {}/{}: {} rolled {} vs SAN {} -> loss {}",
                        turn.position + 1,
                        turn.total,
                        investigator.name,
                        turn.roll,
                        sanity,
                        turn.applicable_loss(sanity)
                    );
                }
            }
            if let Some(pause) = group.pause() {
                if let Some(investigator) = tracker.investigator(pause.investigator) {
                    println!("  Waiting on {} for {}", investigator.name, pause.reason);
                }
            }
            Ok(Step::unchanged())
        }
        _ => Err(USAGE.to_string()),
    }
}

fn outcome(result: Result<Outcome, TrackerError>) -> Result<Step, String> {
    result
        .map(|outcome| Step::from_outcome(&outcome))
        .map_err(|e| e.to_string())
}

fn required(value: String, usage: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        Err(format!("Usage: {usage}"))
    } else {
        Ok(value)
    }
}

fn investigator_arg(tracker: &Tracker, arg: Option<&str>) -> Result<InvestigatorId, String> {
    let index: usize = arg
        .and_then(|a| a.parse().ok())
        .ok_or_else(|| "Expected an investigator number".to_string())?;
    index
        .checked_sub(1)
        .and_then(|i| tracker.id_at(i))
        .ok_or_else(|| format!("No investigator #{index}"))
}

fn pass_arg(arg: Option<&str>, usage: &str) -> Result<bool, String> {
    match arg {
        Some("pass") | Some("p") => Ok(true),
        Some("fail") | Some("f") => Ok(false),
        _ => Err(format!("Usage: {usage}")),
    }
}

fn parse_stat(s: &str) -> Option<Stat> {
    let characteristic = match s.to_lowercase().as_str() {
        "hp" | "health" => return Some(Stat::Health),
        "san" | "sanity" => return Some(Stat::Sanity),
        "str" => Characteristic::Strength,
        "con" => Characteristic::Constitution,
        "siz" => Characteristic::Size,
        "dex" => Characteristic::Dexterity,
        "app" => Characteristic::Appearance,
        "int" => Characteristic::Intelligence,
        "pow" => Characteristic::Power,
        "edu" => Characteristic::Education,
        "luck" => Characteristic::Luck,
        "mythos" | "cthulhu" => Characteristic::Mythos,
        _ => return None,
    };
    Some(Stat::Characteristic(characteristic))
}

fn parse_status(s: &str) -> Option<StatusKind> {
    match s.to_lowercase().as_str() {
        "wound" | "major-wound" => Some(StatusKind::MajorWound),
        "unconscious" => Some(StatusKind::Unconscious),
        "temporary" | "temp" => Some(StatusKind::TemporaryInsanity),
        "indefinite" => Some(StatusKind::IndefiniteInsanity),
        "latent" => Some(StatusKind::LatentInsanity),
        _ => None,
    }
}

fn print_outcome(outcome: &Outcome) {
    for signal in &outcome.signals {
        match signal {
            Signal::Episode(episode) => println!("[EPISODE] {episode}"),
            other => println!("[SIGNAL] {other}"),
        }
    }
}

fn print_pending(tracker: &Tracker) {
    for investigator in tracker.investigators() {
        if investigator.pending.is_empty() {
            continue;
        }
        let checks: Vec<&str> = investigator
            .pending
            .iter()
            .map(|c| c.description())
            .collect();
        println!("[PENDING] {}: {}", investigator.name, checks.join(", "));
    }
}

fn print_roster(tracker: &Tracker) {
    for (index, investigator) in tracker.investigators().iter().enumerate() {
        let labels = investigator.condition.labels();
        println!(
            "  {}. {} ({}) HP {}/{} SAN {}/{}{}",
            index + 1,
            investigator.name,
            investigator.player,
            investigator.health.current,
            investigator.health.maximum,
            investigator.sanity.current,
            investigator.sanity.maximum,
            if labels.is_empty() {
                String::new()
            } else {
                format!(" [{}]", labels.join(", "))
            }
        );
    }
}

fn print_status(investigator: &Investigator) {
    println!("[STATUS]");
    println!("  Investigator: {} ({})", investigator.name, investigator.player);
    println!(
        "  HP: {}/{}  SAN: {}/{}  Lost this session: {}",
        investigator.health.current,
        investigator.health.maximum,
        investigator.sanity.current,
        investigator.sanity.maximum,
        investigator.session_sanity_lost
    );
    let characteristics: Vec<String> = Characteristic::all()
        .iter()
        .map(|c| format!("{} {}", c, investigator.characteristics.get(*c)))
        .collect();
    println!("  {}", characteristics.join("  "));

    let labels = investigator.condition.labels();
    if !labels.is_empty() {
        println!("  Conditions: {}", labels.join(", "));
    }
    if !investigator.pending.is_empty() {
        let checks: Vec<&str> = investigator
            .pending
            .iter()
            .map(|c| c.description())
            .collect();
        println!("  Pending: {}", checks.join(", "));
    }
    if !investigator.skills.is_empty() {
        let skills: Vec<String> = investigator
            .skills
            .iter()
            .map(|(name, value)| format!("{} {}%", name, value))
            .collect();
        println!("  Skills: {}", skills.join(", "));
    }
    if !investigator.notes.skills.is_empty() {
        println!("  Skill notes: {}", investigator.notes.skills);
    }
    if !investigator.notes.inventory.is_empty() {
        println!("  Inventory: {}", investigator.notes.inventory);
    }
    for (key, text) in &investigator.notes.background {
        if !text.is_empty() {
            println!("  {}: {}", key, text);
        }
    }
}

fn print_help() {
    println!("[HELP]");
    println!("  list                          - Show the roster");
    println!("  status <n>                    - Show one investigator");
    println!("  add | remove <n>              - Add or remove an investigator");
    println!("  rename <n> <name>             - Rename an investigator");
    println!("  player <n> <name>             - Set the player name");
    println!("  note <n> <field> <text>       - Set skills, inventory or a background entry");
    println!("  skill <n> <value> <name>      - Set a skill, e.g. 'skill 1 60 Spot Hidden'");
    println!("  unskill <n> <name>            - Remove a skill");
    println!("  skills <n> <Name: v; ...>     - Replace all skills, e.g. 'skills 1 Dodge: 30; Library Use: 70'");
    println!("  check <n> <d100> <skill>      - Grade a skill roll");
    println!("  session start|end|toggle      - Start or end the session");
    println!("  edit <n> <stat> <modifier>    - e.g. 'edit 1 hp -3', 'edit 2 san 45', 'edit 3 con *2'");
    println!("  wound <n> pass|fail           - Major-wound CON test");
    println!("  temp <n> pass|fail            - Temporary-insanity INT test (pass = goes insane)");
    println!("  indefinite <n>                - Confirm indefinite insanity");
    println!("  dying <n> pass|fail           - Dying CON test");
    println!("  recover <n>                   - Start recovery from temporary insanity");
    println!("  latent <n> yes|no             - Finish recovery (latent or cured)");
    println!("  stabilize <n> | destabilize <n>");
    println!("  clear <n> <status>            - wound|unconscious|temporary|indefinite|latent");
    println!("  group open|losses|roll|start|loss|resume|cancel|status");
    println!("  save [path] | load [path]");
    println!("  quit");
    println!();
    println!("  Stats: hp san str con siz dex app int pow edu luck mythos");
}

/// Build the tracker configuration from command line arguments.
pub fn parse_config_from_args(args: &[String]) -> TrackerConfig {
    let mut config = TrackerConfig::from_env();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--save" => {
                if let Some(path) = args.get(i + 1) {
                    config = config.with_save_path(path);
                    i += 1;
                }
            }
            "--fresh" => {
                config = config.with_fresh(true);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stat() {
        assert_eq!(parse_stat("HP"), Some(Stat::Health));
        assert_eq!(parse_stat("san"), Some(Stat::Sanity));
        assert_eq!(
            parse_stat("mythos"),
            Some(Stat::Characteristic(Characteristic::Mythos))
        );
        assert_eq!(parse_stat("charisma"), None);
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("wound"), Some(StatusKind::MajorWound));
        assert_eq!(parse_status("temp"), Some(StatusKind::TemporaryInsanity));
        assert_eq!(parse_status("dead"), None);
    }

    #[test]
    fn test_investigator_arg_is_one_based() {
        let tracker = Tracker::default();
        assert_eq!(investigator_arg(&tracker, Some("1")), Ok(tracker.id_at(0).unwrap()));
        assert!(investigator_arg(&tracker, Some("0")).is_err());
        assert!(investigator_arg(&tracker, Some("6")).is_err());
        assert!(investigator_arg(&tracker, None).is_err());
    }

    #[test]
    fn test_parse_config_from_args() {
        let args: Vec<String> = ["keeper", "--save", "table.json", "--fresh"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let config = parse_config_from_args(&args);
        assert_eq!(config.save_path, std::path::PathBuf::from("table.json"));
        assert!(config.fresh);
    }
}
