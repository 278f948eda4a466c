//! Capability interfaces over external OS mutation (routing table, QoS
//! discipline, arbitrary helper processes). Production code drives these
//! through real `std::process::Command` invocations; tests inject a
//! `RecordingExecutor` and assert on the exact `(cmd, args)` sequence
//! instead of touching the host's network stack.

use std::process::Command;
use tracing::warn;

/// A single shaping/routing class descriptor, independent of the specific
/// queueing discipline used to realize it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassSpec {
    pub classid: String,
    pub mark: Option<u32>,
    pub rate_kbps: u32,
    pub ceil_kbps: u32,
    pub prio: u32,
}

pub trait CommandExecutor: Send {
    /// Runs `cmd` with `args`, returning `true` on success (exit code 0).
    /// Failures are never fatal to the caller; they're logged and retried
    /// on the next tick per the error-handling design.
    fn run(&mut self, cmd: &str, args: &[&str]) -> bool;
}

/// Executes commands for real via `std::process::Command`.
pub struct SystemExecutor;

impl CommandExecutor for SystemExecutor {
    fn run(&mut self, cmd: &str, args: &[&str]) -> bool {
        match Command::new(cmd).args(args).status() {
            Ok(status) if status.success() => true,
            Ok(status) => {
                warn!(cmd, ?args, code = status.code(), "command exited non-zero");
                false
            }
            Err(err) => {
                warn!(cmd, ?args, %err, "failed to spawn command");
                false
            }
        }
    }
}

/// Records every invocation instead of running it; used by tests to assert
/// the exact sequence of `(cmd, args)` an operation issues.
#[derive(Default)]
pub struct RecordingExecutor {
    pub calls: Vec<(String, Vec<String>)>,
    pub fail_next: bool,
}

impl CommandExecutor for RecordingExecutor {
    fn run(&mut self, cmd: &str, args: &[&str]) -> bool {
        self.calls.push((
            cmd.to_string(),
            args.iter().map(|s| s.to_string()).collect(),
        ));
        !std::mem::take(&mut self.fail_next)
    }
}

/// `route_set_default` / `route_clear_default` / `route_default_matches`
/// from the external-interfaces surface, backed by `ip route`.
pub struct RouteController<E: CommandExecutor> {
    exec: E,
}

impl<E: CommandExecutor> RouteController<E> {
    pub fn new(exec: E) -> Self {
        Self { exec }
    }

    pub fn set_default(&mut self, gw_ip: &str, iface: &str) -> bool {
        self.exec.run("ip", &["route", "del", "default"]);
        self.exec
            .run("ip", &["route", "add", "default", "via", gw_ip, "dev", iface])
    }

    pub fn clear_default(&mut self, iface: &str) -> bool {
        let _ = iface;
        self.exec.run("ip", &["route", "del", "default"])
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.exec
    }
}

/// Reads the kernel's current default route(s) to check if one already
/// matches `(gw_ip, iface)`; this is a read path, not run through the
/// `CommandExecutor` abstraction, since the watchdog needs the output
/// rather than just a success/failure bit. Returns `None` if the default
/// route table couldn't be read (treated as "doesn't match" by callers).
pub fn route_default_matches(gw_ip: &str, iface: &str) -> Option<bool> {
    let output = Command::new("ip")
        .args(["route", "show", "default"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    Some(text.lines().any(|line| {
        line.contains(&format!("via {gw_ip} "))
            && line.contains(&format!("dev {iface}"))
    }))
}

/// `qos_install_tree` / `qos_change` from the external-interfaces surface,
/// backed by `tc`. The hierarchy is fixed: root `1:` (htb default 100) ->
/// shaping ceiling `1:99` (100mbit) -> the four traffic leaves.
pub struct QosController<E: CommandExecutor> {
    exec: E,
}

const ROOT_CEILING_MBIT: u32 = 100;

impl<E: CommandExecutor> QosController<E> {
    pub fn new(exec: E) -> Self {
        Self { exec }
    }

    pub fn install_tree(&mut self, iface: &str, classes: &[ClassSpec]) {
        self.exec
            .run("tc", &["qdisc", "del", "dev", iface, "root"]);
        self.exec.run(
            "tc",
            &[
                "qdisc", "add", "dev", iface, "handle", "1:", "root", "htb", "default", "100",
            ],
        );
        let ceil_mbit = format!("{ROOT_CEILING_MBIT}mbit");
        self.exec.run(
            "tc",
            &[
                "class", "add", "dev", iface, "parent", "1:", "classid", "1:99", "htb", "rate",
                &ceil_mbit, "ceil", &ceil_mbit,
            ],
        );

        for c in classes {
            let rate = format!("{}kbit", c.rate_kbps);
            let ceil = format!("{}kbit", c.ceil_kbps);
            let prio = c.prio.to_string();
            self.exec.run(
                "tc",
                &[
                    "class", "add", "dev", iface, "parent", "1:99", "classid", &c.classid, "htb",
                    "rate", &rate, "ceil", &ceil, "prio", &prio,
                ],
            );
            if !self
                .exec
                .run("tc", &["qdisc", "add", "dev", iface, "parent", &c.classid, "fq_codel"])
            {
                self.exec
                    .run("tc", &["qdisc", "add", "dev", iface, "parent", &c.classid, "pfifo"]);
            }
            if let Some(mark) = c.mark {
                let mark_s = mark.to_string();
                self.exec.run(
                    "tc",
                    &[
                        "filter", "add", "dev", iface, "parent", "1:", "protocol", "ip", "prio",
                        "1", "handle", &mark_s, "fw", "flowid", &c.classid,
                    ],
                );
            }
        }
    }

    pub fn change(&mut self, iface: &str, c: &ClassSpec) -> bool {
        let rate = format!("{}kbit", c.rate_kbps);
        let ceil = format!("{}kbit", c.ceil_kbps);
        let prio = c.prio.to_string();
        self.exec.run(
            "tc",
            &[
                "class", "change", "dev", iface, "classid", &c.classid, "htb", "rate", &rate,
                "ceil", &ceil, "prio", &prio,
            ],
        )
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.exec
    }
}
