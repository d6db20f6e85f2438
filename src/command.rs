//! Command descriptors and the root dispatcher.
//!
//! Every command carries a usage line that doubles as its positional arity
//! contract, an optional flag set parsed with clap, the API path it talks to,
//! and the handler that runs it.

use crate::client::ApiClient;
use crate::error::CliError;
use crate::ssh::RemoteShell;
use crate::usage::Usage;
use anyhow::{Context as _, Result, anyhow};
use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgMatches};
use std::fmt::Write as _;
use std::io::{BufRead, Write};

const POSITIONALS: &str = "ARGS";

pub type Handler = fn(&CommandSpec, &Invocation, &mut Context<'_>) -> Result<()>;

#[derive(Debug, Clone, Copy)]
pub enum FlagKind {
    /// `--name=VALUE`; an empty default means "unset".
    Text { default: &'static str },
    /// `--name`
    Switch,
}

#[derive(Debug, Clone, Copy)]
pub struct FlagSpec {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: FlagKind,
}

#[derive(Clone)]
pub struct CommandSpec {
    pub name: &'static str,
    pub usage: &'static str,
    pub about: &'static str,
    /// API path relative to the endpoint.
    pub path: &'static str,
    pub flags: &'static [FlagSpec],
    pub handler: Handler,
}

impl CommandSpec {
    fn flag_parser(&self) -> clap::Command {
        let mut cmd = clap::Command::new(self.name)
            .no_binary_name(true)
            .about(self.about)
            .override_usage(self.usage)
            .arg(
                Arg::new(POSITIONALS)
                    .num_args(0..)
                    .trailing_var_arg(true)
                    .hide(true),
            );

        for flag in self.flags {
            let arg = Arg::new(flag.name).long(flag.name).help(flag.help);
            cmd = cmd.arg(match flag.kind {
                FlagKind::Text { default } => {
                    let arg = arg.value_name("ID").num_args(1);
                    if default.is_empty() {
                        arg
                    } else {
                        arg.default_value(default)
                    }
                }
                FlagKind::Switch => arg.action(ArgAction::SetTrue),
            });
        }
        cmd
    }
}

/// Flags and positional arguments of one command invocation.
#[derive(Debug)]
pub struct Invocation {
    pub args: Vec<String>,
    matches: ArgMatches,
}

impl Invocation {
    pub fn positional(&self, index: usize) -> Result<&str> {
        self.args
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("missing positional argument #{}", index + 1))
    }

    pub fn text(&self, name: &str) -> &str {
        self.matches
            .try_get_one::<String>(name)
            .ok()
            .flatten()
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn switch(&self, name: &str) -> bool {
        self.matches
            .try_get_one::<bool>(name)
            .ok()
            .flatten()
            .copied()
            .unwrap_or(false)
    }
}

/// What a handler may touch. Tests swap the streams and the shell transport.
pub struct Context<'a> {
    pub client: &'a ApiClient,
    pub shell: &'a dyn RemoteShell,
    pub input: &'a mut dyn BufRead,
    pub output: &'a mut dyn Write,
}

struct Registered {
    spec: CommandSpec,
    usage: Usage,
}

pub struct Dispatcher {
    commands: Vec<Registered>,
}

impl Dispatcher {
    pub fn new(specs: Vec<CommandSpec>) -> Result<Self> {
        let commands = specs
            .into_iter()
            .map(|spec| {
                let usage = Usage::parse(spec.usage)
                    .with_context(|| format!("registering `{}`", spec.name))?;
                Ok(Registered { spec, usage })
            })
            .collect::<Result<Vec<_>>>()?;

        for (i, registered) in commands.iter().enumerate() {
            let name = registered.spec.name;
            if commands[..i].iter().any(|earlier| earlier.spec.name == name) {
                return Err(anyhow!("command `{}` is registered twice", name));
            }
        }
        Ok(Self { commands })
    }

    /// Human readable list of commands, used in help and error output.
    pub fn summary(&self) -> String {
        let width = self
            .commands
            .iter()
            .map(|r| r.spec.usage.len())
            .max()
            .unwrap_or(0);
        let mut text = String::from("Commands:");
        for registered in &self.commands {
            let _ = write!(
                text,
                "\n  {:width$}  {}",
                registered.spec.usage,
                registered.spec.about,
                width = width
            );
        }
        text
    }

    /// Fails early on a missing or unknown command name, before any
    /// credentials are needed.
    pub fn check(&self, argv: &[String]) -> Result<(), CliError> {
        self.resolve(argv).map(|_| ())
    }

    pub fn dispatch(&self, ctx: &mut Context<'_>, argv: &[String]) -> Result<()> {
        let registered = self.resolve(argv)?;
        let spec = &registered.spec;

        let matches = match spec.flag_parser().try_get_matches_from(&argv[1..]) {
            Ok(matches) => matches,
            Err(err) if err.kind() == ErrorKind::DisplayHelp => {
                write!(ctx.output, "{}", err.render())?;
                return Ok(());
            }
            Err(err) => {
                return Err(CliError::Usage {
                    message: first_line(&err.to_string()),
                    usage: spec.usage.to_string(),
                }
                .into());
            }
        };

        let args: Vec<String> = matches
            .get_many::<String>(POSITIONALS)
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        registered.usage.validate(args.as_slice())?;

        let bound: Vec<String> = registered
            .usage
            .positional_names()
            .zip(&args)
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        tracing::debug!(command = spec.name, args = ?bound, "dispatching");

        let invocation = Invocation { args, matches };
        (spec.handler)(spec, &invocation, ctx)
    }

    fn lookup(&self, name: &str) -> Option<&Registered> {
        self.commands.iter().find(|r| r.spec.name == name)
    }

    fn resolve(&self, argv: &[String]) -> Result<&Registered, CliError> {
        let name = argv.first().ok_or_else(|| CliError::MissingCommand {
            available: self.summary(),
        })?;
        self.lookup(name).ok_or_else(|| CliError::UnknownCommand {
            name: name.clone(),
            available: self.summary(),
        })
    }
}

fn first_line(message: &str) -> String {
    message
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("error: ")
        .to_string()
}
