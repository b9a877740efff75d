//! Line-oriented command shell
//!
//! Parses one command per line and drives a [`CraftingSession`] against a
//! crafting service. Output is plain text.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

use crate::config::Config;
use crate::crafting::offline::OMENS;
use crate::crafting::{CatalogService, Command, CraftingService, CraftingSession};
use crate::data::{export_default_data, DataManager};
use crate::items::{Item, ModClass, Modifier};
use crate::save::{self, SessionSave};

pub const HELP: &str = "\
commands:
  bases [category]        list base items
  base <name>             start crafting a base (clears history)
  currency [name]         list usable currencies, or select one
  omen [name]             list omens, or toggle one
  craft | retry           apply the selected currency / redo the last craft
  mods                    list modifiers with compatibility
  add <n> [values..]      add modifier n from `mods`
  remove <prefix|suffix> <n>
  quality <n> | ilvl <n>
  reveal <id> | choose <n> | reroll | cancel
  undo | redo | revert <step> | reset | clear
  history | show
  save <name> | load <name> | saves | delete <name>
  export                  write default data files
  quit";

/// What the caller should do after a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Continue(String),
    Quit,
}

pub struct Shell<S> {
    session: CraftingSession,
    service: S,
    data: DataManager,
    config: Config,
    save_dir: PathBuf,
}

impl<S: CraftingService + CatalogService> Shell<S> {
    pub fn new(service: S, data: DataManager, config: Config) -> Self {
        let session = CraftingSession::new(data.exclusion_catalog(), &config);
        let save_dir = save::save_directory(config.save_dir.as_deref());
        Self { session, service, data, config, save_dir }
    }

    pub fn session(&self) -> &CraftingSession {
        &self.session
    }

    /// Run one line of input
    pub fn execute(&mut self, line: &str) -> Result<Outcome> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(Outcome::Continue(String::new()));
        };
        let args: Vec<&str> = words.collect();
        let rest = args.join(" ");
        log::debug!("command: {} {}", command, rest);

        let output = match command.to_ascii_lowercase().as_str() {
            "help" | "?" => HELP.to_string(),
            "quit" | "exit" | "q" => return Ok(Outcome::Quit),
            "bases" => self.list_bases(args.first().copied()),
            "base" => self.select_base(&rest)?,
            "currency" | "currencies" => self.currency(&rest)?,
            "omen" | "omens" => self.omen(&rest),
            "craft" => self.session.craft(&self.service)?,
            "retry" => self.session.retry_last(&self.service)?,
            "mods" => self.list_mods()?,
            "add" => self.add(&args)?,
            "remove" => self.remove(&args)?,
            "quality" => {
                self.session.set_quality(parse_number(args.first(), "quality")?)?;
                self.show()
            }
            "ilvl" => {
                self.session.set_item_level(parse_number(args.first(), "item level")?)?;
                self.show()
            }
            "reveal" => {
                let id = args.first().ok_or_else(|| anyhow!("usage: reveal <id>"))?;
                let offer = self.session.request_reveal(&self.service, id)?;
                format_offer(offer)
            }
            "reroll" => {
                let offer = self.session.reroll_reveal(&self.service)?;
                format_offer(offer)
            }
            "choose" => {
                let index: usize = parse_number(args.first(), "choice")?;
                self.session.select_reveal(index)?;
                self.show()
            }
            "cancel" => {
                if self.session.cancel_reveal() {
                    "reveal cancelled".to_string()
                } else {
                    "no reveal in progress".to_string()
                }
            }
            "undo" => self.history_command(Command::Undo)?,
            "redo" => self.history_command(Command::Redo)?,
            "revert" => self.history_command(Command::RevertTo(parse_number(args.first(), "step")?))?,
            "reset" => self.history_command(Command::Reset)?,
            "clear" => self.history_command(Command::Clear)?,
            "history" => self.history(),
            "show" => self.show(),
            "save" => self.save(&rest)?,
            "load" => self.load(&rest)?,
            "saves" => self.list_saves(),
            "delete" => {
                if save::delete_save(&self.save_dir, &rest)? {
                    format!("deleted {}", rest)
                } else {
                    format!("no save named {}", rest)
                }
            }
            "export" => {
                export_default_data(&self.config.data_dir)?;
                format!("default data written to {}", self.config.data_dir.display())
            }
            other => bail!("unknown command {:?} (try `help`)", other),
        };
        Ok(Outcome::Continue(output))
    }

    fn list_bases(&self, category: Option<&str>) -> String {
        self.data
            .bases
            .bases
            .iter()
            .filter(|b| category.map_or(true, |c| b.category.eq_ignore_ascii_case(c)))
            .map(|b| {
                let stats: Vec<String> = b.base_stats.iter().map(|(k, v)| format!("{} {}", k.name(), v)).collect();
                format!("{} [{}] {}", b.name, b.category, stats.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn select_base(&mut self, name: &str) -> Result<String> {
        let base = self.data.bases.find(name).ok_or_else(|| anyhow!("no base named {:?}", name))?;
        let item = Item::from_base(base, self.config.default_item_level);
        self.session.apply(Command::SelectBase(item))?;
        Ok(self.show())
    }

    fn current_item(&self) -> Result<&Item> {
        self.session.item().ok_or_else(|| anyhow!("no base selected"))
    }

    fn currency(&mut self, name: &str) -> Result<String> {
        let item = self.current_item()?;
        let usable = self.service.available_currencies(item)?;
        if name.is_empty() {
            let selected = self.session.selected_currency().unwrap_or("none");
            return Ok(format!("selected: {}\nusable: {}", selected, usable.join(", ")));
        }
        let currency = usable
            .iter()
            .find(|c| c.eq_ignore_ascii_case(name))
            .cloned()
            .unwrap_or_else(|| name.to_string());
        self.session.select_currency(currency.clone());
        Ok(format!("selected {}", currency))
    }

    fn omen(&mut self, name: &str) -> String {
        if name.is_empty() {
            let active: Vec<&str> = self.session.active_omens().iter().map(String::as_str).collect();
            return format!("active: {}\nknown: {}", active.join(", "), OMENS.join(", "));
        }
        let omen = OMENS
            .iter()
            .find(|o| o.eq_ignore_ascii_case(name))
            .map(|o| o.to_string())
            .unwrap_or_else(|| name.to_string());
        if self.session.toggle_omen(omen.clone()) {
            format!("{} active", omen)
        } else {
            format!("{} removed", omen)
        }
    }

    fn list_mods(&self) -> Result<String> {
        let pool = self.service.available_modifiers(self.current_item()?)?;
        let choices = self.session.available_choices(&pool)?;
        Ok(choices
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let verdict = match c.verdict.clone().into_result() {
                    Ok(()) => String::new(),
                    Err(reason) => format!("  (unavailable: {})", reason),
                };
                let m = &c.modifier;
                format!("{:>3} {} {} T{}: {}{}", i, m.class.name(), m.name, m.tier, one_line(m), verdict)
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn add(&mut self, args: &[&str]) -> Result<String> {
        let index: usize = parse_number(args.first(), "modifier")?;
        let pool = self.service.available_modifiers(self.current_item()?)?;
        let choices = self.session.available_choices(&pool)?;
        let mut modifier = choices
            .into_iter()
            .nth(index)
            .map(|c| c.modifier)
            .ok_or_else(|| anyhow!("no modifier {}", index))?;

        let values = args[1..]
            .iter()
            .map(|v| v.parse::<i32>().with_context(|| format!("bad value {:?}", v)))
            .collect::<Result<Vec<_>>>()?;
        if values.is_empty() {
            modifier.roll_midpoint();
        } else {
            modifier.values = values;
            if !modifier.values_in_range() {
                bail!("values must match the modifier's ranges");
            }
        }
        self.session.apply(Command::AddModifier(modifier))?;
        Ok(self.show())
    }

    fn remove(&mut self, args: &[&str]) -> Result<String> {
        let class = match args.first().map(|s| s.to_ascii_lowercase()).as_deref() {
            Some("prefix") | Some("p") => ModClass::Prefix,
            Some("suffix") | Some("s") => ModClass::Suffix,
            _ => bail!("usage: remove <prefix|suffix> <n>"),
        };
        let index = parse_number(args.get(1), "index")?;
        self.session.apply(Command::RemoveModifier { class, index })?;
        Ok(self.show())
    }

    fn history_command(&mut self, command: Command) -> Result<String> {
        self.session.apply(command)?;
        Ok(self.show())
    }

    fn history(&self) -> String {
        let history = self.session.history();
        if history.is_empty() {
            return "history is empty".to_string();
        }
        let mut lines: Vec<String> = history
            .entries()
            .iter()
            .map(|e| {
                let retry = if e.action.replay().is_some() { " [retryable]" } else { "" };
                format!("{:>3}. {}{}", e.ordinal, e.description, retry)
            })
            .collect();
        if history.can_redo() {
            lines.push(format!("     ({} undone)", history.redo_frames().len()));
        }
        lines.join("\n")
    }

    fn show(&self) -> String {
        match self.session.item() {
            Some(item) => item.summary_lines().join("\n"),
            None => "no base selected".to_string(),
        }
    }

    fn save(&self, name: &str) -> Result<String> {
        let snapshot = SessionSave::capture(&self.session)?;
        let path = save::save_session(&self.save_dir, name, &snapshot)?;
        Ok(format!("saved to {}", path.display()))
    }

    fn load(&mut self, name: &str) -> Result<String> {
        let snapshot = save::load_session(&self.save_dir, name)?;
        snapshot.restore_into(&mut self.session);
        Ok(self.show())
    }

    fn list_saves(&self) -> String {
        let saves = save::list_saves(&self.save_dir);
        if saves.is_empty() {
            return format!("no saves in {}", self.save_dir.display());
        }
        saves
            .iter()
            .map(|s| format!("{}: {} ({} steps)", s.name, s.base_name.as_deref().unwrap_or("empty"), s.steps))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn parse_number<T: std::str::FromStr>(arg: Option<&&str>, what: &str) -> Result<T> {
    let arg = arg.ok_or_else(|| anyhow!("missing {}", what))?;
    arg.parse().map_err(|_| anyhow!("invalid {}: {:?}", what, arg))
}

/// Multi-line modifier text joined for listings
fn one_line(modifier: &Modifier) -> String {
    modifier.display_text().replace('\n', " / ")
}

fn format_offer(offer: &crate::crafting::RevealOffer) -> String {
    let mut lines: Vec<String> = offer
        .choices
        .iter()
        .enumerate()
        .map(|(i, m)| format!("{:>3} {}: {}", i, m.name, one_line(m)))
        .collect();
    if offer.has_reroll_omen && !offer.reroll_used {
        lines.push("     (reroll available)".to_string());
    }
    lines.join("\n")
}
