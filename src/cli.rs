//! Command-line interface
//!
//! The clap tree mirrors the operation table. Every data command turns into
//! an operation name plus a string-valued argument map, and validation is
//! left to the router so both front ends fail the same way.

use crate::dispatch::ArgMap;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "healthbridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Read and write personal health data from the terminal or over MCP")]
#[command(long_about = "HealthBridge exposes steps, heart rate, workouts, activity rings and \
every other supported quantity type through one CLI and one MCP tool server.\n\n\
Dates accept: now, today, relative offsets (12h, 7d, 2w, 3m), \
YYYY-MM-DD and full ISO 8601 timestamps.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Print the canonical JSON document instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (default: ~/.config/healthbridge/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show availability and per-type authorization
    Status,

    /// List supported data types
    Types,

    /// Request access to data types
    Authorize {
        /// Only request read access
        #[arg(long)]
        read_only: bool,
        /// Data type ids (default: all)
        types: Vec<String>,
    },

    /// Read health data
    Read {
        #[command(subcommand)]
        target: ReadCommand,
    },

    /// Save health data
    Write {
        #[command(subcommand)]
        target: WriteCommand,
    },

    /// Aggregate health data
    Query {
        #[command(subcommand)]
        target: QueryCommand,
    },

    /// Tool server
    Mcp {
        #[command(subcommand)]
        action: McpCommand,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ReadCommand {
    /// Total steps over a range
    Steps {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },

    /// Heart rate samples and summary
    HeartRate {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(short, long)]
        limit: Option<String>,
    },

    /// Workouts, newest first
    Workouts {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Activity filter, e.g. running
        #[arg(short, long)]
        activity: Option<String>,
        #[arg(short, long)]
        limit: Option<String>,
    },

    /// Activity ring summary for one day
    Activity {
        #[arg(long)]
        date: Option<String>,
    },

    /// Samples of any quantity type
    Quantity {
        /// Data type id, e.g. weight
        #[arg(value_name = "TYPE")]
        data_type: String,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(short, long)]
        unit: Option<String>,
        #[arg(short, long)]
        limit: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum WriteCommand {
    /// Save one quantity sample
    Quantity {
        #[arg(value_name = "TYPE")]
        data_type: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
        #[arg(short, long)]
        unit: Option<String>,
        #[arg(long)]
        date: Option<String>,
    },

    /// Save a workout
    Workout {
        /// Activity, e.g. running
        activity: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        /// Energy burned in kcal
        #[arg(long, allow_hyphen_values = true)]
        calories: Option<String>,
        /// Distance in meters
        #[arg(long, allow_hyphen_values = true)]
        distance: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum QueryCommand {
    /// Sum or average/min/max/most recent, by type
    Stats {
        #[arg(value_name = "TYPE")]
        data_type: String,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(short, long)]
        unit: Option<String>,
    },

    /// Per-period buckets
    Trends {
        #[arg(value_name = "TYPE")]
        data_type: String,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// day, week or month
        #[arg(short, long)]
        interval: Option<String>,
        #[arg(short, long)]
        unit: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum McpCommand {
    /// Serve newline-delimited JSON-RPC on stdin/stdout
    Serve,
    /// Print the tool table
    Tools,
}

/// A data command resolved to an operation call
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub operation: &'static str,
    pub args: ArgMap,
}

#[derive(Default)]
struct ArgBuilder(ArgMap);

impl ArgBuilder {
    fn set(mut self, name: &str, value: &str) -> Self {
        self.0.insert(name.to_string(), Value::String(value.to_string()));
        self
    }

    fn maybe(self, name: &str, value: &Option<String>) -> Self {
        match value {
            Some(v) => self.set(name, v),
            None => self,
        }
    }
}

impl Commands {
    /// Operation name and arguments; `None` for local commands
    pub fn invocation(&self) -> Option<Invocation> {
        let (operation, args) = match self {
            Commands::Status => ("health_status", ArgBuilder::default()),
            Commands::Types => ("health_list_types", ArgBuilder::default()),
            Commands::Authorize { read_only, types } => {
                let mut args = ArgBuilder::default();
                if *read_only {
                    args = args.set("read_only", "true");
                }
                if !types.is_empty() {
                    args.0.insert(
                        "types".to_string(),
                        Value::Array(types.iter().cloned().map(Value::String).collect()),
                    );
                }
                ("health_authorize", args)
            }
            Commands::Read { target } => target.invocation(),
            Commands::Write { target } => target.invocation(),
            Commands::Query { target } => target.invocation(),
            Commands::Mcp { .. } | Commands::Config { .. } => return None,
        };

        Some(Invocation {
            operation,
            args: args.0,
        })
    }
}

impl ReadCommand {
    fn invocation(&self) -> (&'static str, ArgBuilder) {
        let args = ArgBuilder::default();
        match self {
            ReadCommand::Steps { from, to } => (
                "health_read_steps",
                args.maybe("from", from).maybe("to", to),
            ),
            ReadCommand::HeartRate { from, to, limit } => (
                "health_read_heart_rate",
                args.maybe("from", from).maybe("to", to).maybe("limit", limit),
            ),
            ReadCommand::Workouts {
                from,
                to,
                activity,
                limit,
            } => (
                "health_read_workouts",
                args.maybe("from", from)
                    .maybe("to", to)
                    .maybe("activity", activity)
                    .maybe("limit", limit),
            ),
            ReadCommand::Activity { date } => ("health_read_activity", args.maybe("date", date)),
            ReadCommand::Quantity {
                data_type,
                from,
                to,
                unit,
                limit,
            } => (
                "health_read_quantity",
                args.set("type", data_type)
                    .maybe("from", from)
                    .maybe("to", to)
                    .maybe("unit", unit)
                    .maybe("limit", limit),
            ),
        }
    }
}

impl WriteCommand {
    fn invocation(&self) -> (&'static str, ArgBuilder) {
        let args = ArgBuilder::default();
        match self {
            WriteCommand::Quantity {
                data_type,
                value,
                unit,
                date,
            } => (
                "health_write_quantity",
                args.set("type", data_type)
                    .set("value", value)
                    .maybe("unit", unit)
                    .maybe("date", date),
            ),
            WriteCommand::Workout {
                activity,
                start,
                end,
                calories,
                distance,
            } => (
                "health_write_workout",
                args.set("activity", activity)
                    .set("start", start)
                    .set("end", end)
                    .maybe("calories", calories)
                    .maybe("distance", distance),
            ),
        }
    }
}

impl QueryCommand {
    fn invocation(&self) -> (&'static str, ArgBuilder) {
        let args = ArgBuilder::default();
        match self {
            QueryCommand::Stats {
                data_type,
                from,
                to,
                unit,
            } => (
                "health_query_stats",
                args.set("type", data_type)
                    .maybe("from", from)
                    .maybe("to", to)
                    .maybe("unit", unit),
            ),
            QueryCommand::Trends {
                data_type,
                from,
                to,
                interval,
                unit,
            } => (
                "health_query_trends",
                args.set("type", data_type)
                    .maybe("from", from)
                    .maybe("to", to)
                    .maybe("interval", interval)
                    .maybe("unit", unit),
            ),
        }
    }
}
