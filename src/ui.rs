// UI layer: interactive menu built with `dialoguer`. All session state
// lives in a `Context` that is handed to each command handler; the handlers
// only prompt, call the library and print.

use std::io;
use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::Result;
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use dialoguer::{Confirm, Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use crate::apic::ApicSession;
use crate::config::Config;
use crate::error::DispatchError;
use crate::format;
use crate::library::Library;
use crate::spark::{MessageDraft, RoomFilter, SparkSession};
use crate::transport::HttpTransport;

const SPARK_NOT_READY: &str = "Verify that a Spark user token is set via 'Spark user' \
     and a room is selected via 'Spark rooms'.";

/// Shown in place of the selected room's title when it cannot be looked up.
const UNKNOWN_ROOM: &str = "unknown (lookup failed)";

/// State shared by the commands of one interactive session.
pub struct Context<T> {
    pub library: Library<T>,
    pub spark: SparkSession<T>,
    /// Spark room results are relayed to.
    pub room: Option<String>,
    pub path_trace_wait: Duration,
}

impl<T: HttpTransport> Context<T> {
    pub fn new(library: Library<T>, spark: SparkSession<T>, path_trace_wait: Duration) -> Self {
        Context {
            library,
            spark,
            room: None,
            path_trace_wait,
        }
    }

    /// Room to relay to, if a room is selected and the token still works.
    pub fn relay_room(&self) -> Option<&str> {
        let room = self.room.as_deref()?;
        self.spark.validate_token().then_some(room)
    }

    /// Post `text` to the selected room. Returns `false`, without sending
    /// anything, when no room is selected or the token no longer validates.
    pub fn relay(&self, text: &str) -> Result<bool, DispatchError> {
        let Some(room) = self.relay_room() else {
            warn!("relay requested without a usable spark room");
            return Ok(false);
        };
        self.spark.post_message(&MessageDraft::text_to_room(room, text))?;
        Ok(true)
    }

    /// Title of the selected room. A failed lookup (room deleted, user
    /// removed from it) yields a placeholder so a new room can still be
    /// picked.
    pub fn current_room_title(&self) -> Option<String> {
        let id = self.room.as_deref()?;
        match self.spark.room(id) {
            Ok(room) => Some(room.title),
            Err(e) => {
                warn!(room = id, error = %e, "selected spark room lookup failed");
                Some(UNKNOWN_ROOM.to_string())
            }
        }
    }
}

/// Print the startup banner.
pub fn banner() {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("  {} {}", "APIC-EM CLI".green().bold(), format!("v{version}").green());
    println!();
}

/// Prompt for controller credentials until a login succeeds. Values already
/// present in `config` are used for the first attempt only.
pub fn connect<T: HttpTransport + Clone>(config: &Config, transport: &T) -> Result<Library<T>> {
    let mut host = config.apic_host.clone();
    let mut user = config.apic_user.clone();
    let mut password = config.apic_password.clone();

    loop {
        if host.is_none() || user.is_none() || password.is_none() {
            println!("Please enter your APIC-EM credentials.");
        }
        let h = match host.take() {
            Some(h) => h,
            None => Input::new().with_prompt("Host").interact_text()?,
        };
        let u = match user.take() {
            Some(u) => u,
            None => Input::new().with_prompt("User").interact_text()?,
        };
        let p = match password.take() {
            Some(p) => p,
            None => Password::new().with_prompt("Password").interact()?,
        };

        let spinner = spinner("Logging in...")?;
        let result = ApicSession::connect(&h, &u, &p, transport.clone());
        spinner.finish_and_clear();
        match result {
            Ok(session) => return Ok(Library::new(session)),
            Err(e) => println!("{e}\n"),
        }
    }
}

/// Clear the terminal once the session is established.
pub fn clear_screen() -> Result<()> {
    execute!(io::stdout(), Clear(ClearType::All), MoveTo(0, 0))?;
    Ok(())
}

/// Main interactive menu. Runs until the user chooses "Exit".
pub fn main_menu<T: HttpTransport>(ctx: &mut Context<T>) -> Result<()> {
    let items = vec!["Network devices", "Path trace", "Spark rooms", "Spark user", "Exit"];
    loop {
        println!();
        let selection = Select::new().items(&items).default(0).interact()?;
        println!();
        match selection {
            0 => handle_devices(ctx)?,
            1 => handle_path_trace(ctx)?,
            2 => handle_rooms(ctx)?,
            3 => handle_spark_user(ctx)?,
            _ => break,
        }
    }
    Ok(())
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

/// Ask whether to relay the next result, refusing when Spark is not ready.
/// Returns `None` when the command should be aborted.
fn ask_relay<T: HttpTransport>(ctx: &Context<T>) -> Result<Option<bool>> {
    let relay = Confirm::new()
        .with_prompt("Send result to the Spark room?")
        .default(false)
        .interact()?;
    if relay && ctx.relay_room().is_none() {
        println!("{SPARK_NOT_READY}");
        return Ok(None);
    }
    Ok(Some(relay))
}

fn send_to_spark<T: HttpTransport>(ctx: &Context<T>, text: &str) {
    match ctx.relay(text) {
        Ok(true) => println!("Result posted to Spark."),
        Ok(false) => println!("{SPARK_NOT_READY}"),
        Err(e) => println!("Posting to Spark failed: {e}"),
    }
}

fn optional_number(prompt: &str) -> Result<Option<u32>> {
    let raw: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .validate_with(|input: &String| -> Result<(), String> {
            if input.trim().is_empty() || input.trim().parse::<u32>().is_ok() {
                Ok(())
            } else {
                Err("Please enter a positive number or leave empty.".into())
            }
        })
        .interact_text()?;
    Ok(raw.trim().parse().ok())
}

fn optional_text(prompt: &str) -> Result<Option<String>> {
    let raw: String = Input::new().with_prompt(prompt).allow_empty(true).interact_text()?;
    let raw = raw.trim();
    Ok((!raw.is_empty()).then(|| raw.to_string()))
}

/// List network devices, optionally relaying them to Spark.
fn handle_devices<T: HttpTransport>(ctx: &mut Context<T>) -> Result<()> {
    let Some(relay) = ask_relay(ctx)? else {
        return Ok(());
    };
    let max = optional_number("Maximum number of devices (empty for all)")?;

    let devices = match ctx.library.network_devices(max) {
        Ok(devices) => devices,
        Err(e) => {
            println!("Fetching network devices failed: {e}");
            return Ok(());
        }
    };
    print!("{}", format::devices_table(&devices));

    if relay {
        send_to_spark(ctx, &format::devices_message(&devices));
    }
    Ok(())
}

/// Trace the path between two addresses, optionally relaying it to Spark.
fn handle_path_trace<T: HttpTransport>(ctx: &mut Context<T>) -> Result<()> {
    let Some(relay) = ask_relay(ctx)? else {
        return Ok(());
    };
    let source: Ipv4Addr = Input::new().with_prompt("Source IP").interact_text()?;
    let destination: Ipv4Addr = Input::new().with_prompt("Destination IP").interact_text()?;

    let spinner = spinner("Waiting for path trace to finish...")?;
    let result = ctx.library.path_trace(
        &source.to_string(),
        &destination.to_string(),
        ctx.path_trace_wait,
    );
    spinner.finish_and_clear();

    let text = match result {
        Ok(trace) => format::path_trace_text(&trace),
        Err(e) => {
            println!("Path trace failed: {e}");
            return Ok(());
        }
    };
    print!("{text}");

    if relay {
        send_to_spark(ctx, &text);
    }
    Ok(())
}

/// Show the rooms of the current Spark user and optionally pick a new one.
fn handle_rooms<T: HttpTransport>(ctx: &mut Context<T>) -> Result<()> {
    if !ctx.spark.validate_token() {
        println!("Please set your Spark user token first with 'Spark user'.");
        return Ok(());
    }

    let mut filter = RoomFilter::default();
    if Confirm::new().with_prompt("Filter rooms?").default(false).interact()? {
        filter.team_id = optional_text("Team ID (empty for any)")?;
        filter.max = optional_number("Maximum number of rooms (empty for all)")?;
        let types = ["any", "group", "direct"];
        let choice = Select::new().with_prompt("Room type").items(&types).default(0).interact()?;
        filter.room_type = (choice > 0).then(|| types[choice].to_string());
    }

    let rooms = match ctx.spark.list_rooms(&filter) {
        Ok(list) => list.items,
        Err(e) => {
            println!("Listing Spark rooms failed: {e}");
            return Ok(());
        }
    };
    let current = ctx.current_room_title();
    print!("{}", format::rooms_table(&rooms, ctx.room.as_deref(), current.as_deref()));
    println!();

    if rooms.is_empty() {
        return Ok(());
    }
    if !Confirm::new()
        .with_prompt("Do you want to select a new Spark room?")
        .default(true)
        .interact()?
    {
        return Ok(());
    }

    let titles: Vec<&str> = rooms.iter().map(|r| r.title.as_str()).collect();
    let index = Select::new().with_prompt("New room").items(&titles).default(0).interact()?;
    let room = &rooms[index];
    ctx.room = Some(room.id.clone());
    println!("New room set to: {}", room.title);
    Ok(())
}

/// Show the current Spark user and optionally switch tokens.
fn handle_spark_user<T: HttpTransport>(ctx: &mut Context<T>) -> Result<()> {
    match ctx.spark.identity() {
        Some(person) => print!("{}", format::identity_text(&person)),
        None => println!("No valid Spark user token is set."),
    }
    println!();

    if !Confirm::new()
        .with_prompt("Do you want to set a new Spark user token?")
        .default(true)
        .interact()?
    {
        return Ok(());
    }

    let token = Password::new().with_prompt("New Spark token").interact()?;
    if ctx.spark.set_token(token.trim()) {
        if let Some(person) = ctx.spark.identity() {
            print!("{}", format::identity_text(&person));
        }
    } else {
        println!("New Spark user token is not valid.");
    }
    Ok(())
}
