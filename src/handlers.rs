use crate::client::encode_form;
use crate::command::{CommandSpec, Context, FlagKind, FlagSpec, Invocation};
use crate::error::CliError;
use crate::printer::print_response;
use crate::ssh;
use anyhow::{Context as _, Result};
use reqwest::Method;
use std::io::{BufRead, Write};

const CREATE_FLAGS: &[FlagSpec] = &[
    FlagSpec {
        name: "osid",
        help: "os id (* required)",
        kind: FlagKind::Text { default: "" },
    },
    FlagSpec {
        name: "dcid",
        help: "regions id (* required)",
        kind: FlagKind::Text { default: "" },
    },
    FlagSpec {
        name: "vpsplanid",
        help: "plan id (* required)",
        kind: FlagKind::Text { default: "" },
    },
];

const DESTROY_FLAGS: &[FlagSpec] = &[FlagSpec {
    name: "yes",
    help: "destroy without asking for confirmation",
    kind: FlagKind::Switch,
}];

/// Every command the CLI understands, in help order.
pub fn registry() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            name: "list",
            usage: "list",
            about: "List servers on the account",
            path: "v1/server/list",
            flags: &[],
            handler: run_list,
        },
        CommandSpec {
            name: "os",
            usage: "os",
            about: "List available operating systems",
            path: "v1/os/list",
            flags: &[],
            handler: run_list,
        },
        CommandSpec {
            name: "regions",
            usage: "regions",
            about: "List datacenter regions",
            path: "v1/regions/list",
            flags: &[],
            handler: run_list,
        },
        CommandSpec {
            name: "plans",
            usage: "plans",
            about: "List server plans",
            path: "v1/plans/list",
            flags: &[],
            handler: run_list,
        },
        CommandSpec {
            name: "create",
            usage: "create --osid=ID --dcid=ID --vpsplanid=ID",
            about: "Create a server",
            path: "v1/server/create",
            flags: CREATE_FLAGS,
            handler: run_create,
        },
        CommandSpec {
            name: "start",
            usage: "start <subid>",
            about: "Start a server",
            path: "v1/server/start",
            flags: &[],
            handler: run_server_action,
        },
        CommandSpec {
            name: "halt",
            usage: "halt <subid>",
            about: "Halt a server (hard power off)",
            path: "v1/server/halt",
            flags: &[],
            handler: run_server_action,
        },
        CommandSpec {
            name: "reboot",
            usage: "reboot <subid>",
            about: "Reboot a server (hard reboot)",
            path: "v1/server/reboot",
            flags: &[],
            handler: run_server_action,
        },
        CommandSpec {
            name: "destroy",
            usage: "destroy [--yes] <subid>",
            about: "Destroy a server and all of its data",
            path: "v1/server/destroy",
            flags: DESTROY_FLAGS,
            handler: run_destroy,
        },
        CommandSpec {
            name: "ssh",
            usage: "ssh <subid> ...",
            about: "Open a root shell on a server",
            path: "v1/server/list",
            flags: &[],
            handler: run_ssh,
        },
    ]
}

fn run_list(spec: &CommandSpec, _inv: &Invocation, ctx: &mut Context<'_>) -> Result<()> {
    let request = ctx.client.new_request(Method::GET, spec.path, None)?;
    print_response(ctx.output, ctx.client.execute(request))
}

fn run_server_action(spec: &CommandSpec, inv: &Invocation, ctx: &mut Context<'_>) -> Result<()> {
    let subid = inv.positional(0)?;
    let body = encode_form(&[("SUBID", subid)]);
    let request = ctx.client.new_request(Method::POST, spec.path, Some(body))?;
    print_response(ctx.output, ctx.client.execute(request))
}

fn run_create(spec: &CommandSpec, inv: &Invocation, ctx: &mut Context<'_>) -> Result<()> {
    let osid = inv.text("osid");
    let dcid = inv.text("dcid");
    let vpsplanid = inv.text("vpsplanid");

    let missing: Vec<String> = [("osid", osid), ("dcid", dcid), ("vpsplanid", vpsplanid)]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| format!("--{name}"))
        .collect();
    if !missing.is_empty() {
        return Err(CliError::Usage {
            message: format!("missing required option {}", missing.join(", ")),
            usage: spec.usage.to_string(),
        }
        .into());
    }

    print_response(
        ctx.output,
        ctx.client.post_form(
            spec.path,
            &[("OSID", osid), ("DCID", dcid), ("VPSPLANID", vpsplanid)],
        ),
    )
}

fn run_destroy(spec: &CommandSpec, inv: &Invocation, ctx: &mut Context<'_>) -> Result<()> {
    let subid = inv.positional(0)?;

    if !inv.switch("yes") {
        write!(ctx.output, "Really destroy {subid}? [y/N]")?;
        ctx.output.flush()?;

        let mut answer = String::new();
        ctx.input
            .read_line(&mut answer)
            .context("reading confirmation")?;
        if !matches!(answer.trim(), "y" | "Y") {
            writeln!(ctx.output)?;
            return Err(CliError::Aborted.into());
        }
    }

    run_server_action(spec, inv, ctx)
}

fn run_ssh(spec: &CommandSpec, inv: &Invocation, ctx: &mut Context<'_>) -> Result<()> {
    let subid = inv.positional(0)?;
    ssh::open_shell(ctx.client, ctx.shell, ctx.output, spec.path, subid)
}
