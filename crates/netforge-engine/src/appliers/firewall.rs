//! Firewall applier
//!
//! Renders `defaults`, `rule`, and `zone` sections into a single nftables
//! ruleset document and loads it atomically with `nft -f -`: the load
//! either replaces the whole ruleset or fails leaving the prior ruleset
//! intact. The live ruleset is captured as a text blob before apply for
//! rollback.

use crate::appliers::Applier;
use crate::cmd::{run_checked, run_with_stdin};
use crate::ctx::ApplyContext;
use netforge_core::errors::{apply_error, Result};
use netforge_core::model::ConfigDocument;
use netforge_core::validate;
use std::fmt::Write;

/// Applies firewall configuration through nftables
pub struct FirewallApplier {
    /// Live ruleset captured before the most recent apply
    previous_rules: Option<String>,
}

impl FirewallApplier {
    pub fn new() -> Self {
        Self {
            previous_rules: None,
        }
    }

    fn save_current_rules(&mut self, ctx: &ApplyContext) -> Result<()> {
        let output = run_checked(ctx, "nft", &["list", "ruleset"])?;
        self.previous_rules = Some(output.stdout);
        Ok(())
    }

    fn load_ruleset(&self, ctx: &ApplyContext, ruleset: &str) -> Result<()> {
        run_with_stdin(ctx, "nft", &["-f", "-"], ruleset)?;
        tracing::info!("firewall ruleset applied");
        Ok(())
    }
}

impl Default for FirewallApplier {
    fn default() -> Self {
        Self::new()
    }
}

impl Applier for FirewallApplier {
    fn name(&self) -> &'static str {
        "firewall"
    }

    fn apply(&mut self, ctx: &ApplyContext, doc: &ConfigDocument) -> Result<()> {
        if let Err(e) = self.save_current_rules(ctx) {
            tracing::warn!(error = %e, "failed to save current firewall rules");
        }

        let ruleset = render_ruleset(doc)?;
        self.load_ruleset(ctx, &ruleset)
    }

    fn validate(&mut self, ctx: &ApplyContext) -> Result<()> {
        let output = run_checked(ctx, "nft", &["list", "ruleset"])?;
        if output.stdout.trim().is_empty() {
            return Err(apply_error("firewall", "no firewall rules loaded"));
        }
        Ok(())
    }

    fn rollback(&mut self, ctx: &ApplyContext) -> Result<()> {
        let previous = self
            .previous_rules
            .as_deref()
            .ok_or_else(|| apply_error("firewall", "no previous rules to restore"))?;

        tracing::info!("rolling back firewall configuration");
        self.load_ruleset(ctx, previous)
    }
}

/// Render the nftables ruleset document for a firewall configuration
///
/// One `inet` table with input/forward/output filter chains and
/// prerouting/postrouting NAT chains. All interface names, protocols,
/// ports, and targets are validated before emission; any invalid value
/// aborts with a validation error before the kernel sees anything.
pub fn render_ruleset(doc: &ConfigDocument) -> Result<String> {
    let mut out = String::new();

    out.push_str("#!/usr/sbin/nft -f\n\n");
    out.push_str("flush ruleset\n\n");
    out.push_str("table inet router {\n");

    // Chain policies, with documented fallbacks when defaults are absent
    let defaults = doc.section("defaults", "");
    let mut input_policy = "accept".to_string();
    let mut output_policy = "accept".to_string();
    let mut forward_policy = "drop".to_string();

    if let Some(defaults) = defaults {
        if let Some(v) = defaults.option("input") {
            validate::policy(v)?;
            input_policy = v.to_ascii_lowercase();
        }
        if let Some(v) = defaults.option("output") {
            validate::policy(v)?;
            output_policy = v.to_ascii_lowercase();
        }
        if let Some(v) = defaults.option("forward") {
            validate::policy(v)?;
            forward_policy = v.to_ascii_lowercase();
        }
    }

    // Input chain
    out.push_str("\tchain input {\n");
    let _ = writeln!(
        out,
        "\t\ttype filter hook input priority filter; policy {input_policy};\n"
    );
    out.push_str("\t\t# Allow loopback\n");
    out.push_str("\t\tiif lo accept\n\n");
    out.push_str("\t\t# Allow established/related\n");
    out.push_str("\t\tct state established,related accept\n\n");
    out.push_str("\t\t# Allow ICMP\n");
    out.push_str("\t\tip protocol icmp accept\n");
    out.push_str("\t\tip6 nexthdr icmpv6 accept\n");
    out.push_str("\t}\n\n");

    // Forward chain with per-rule lines
    out.push_str("\tchain forward {\n");
    let _ = writeln!(
        out,
        "\t\ttype filter hook forward priority filter; policy {forward_policy};\n"
    );
    out.push_str("\t\t# Allow established/related\n");
    out.push_str("\t\tct state established,related accept\n\n");

    for rule in doc.sections_by_type("rule") {
        if let Some(name) = rule.option("name") {
            let _ = writeln!(out, "\t\t# Rule: {}", validate::sanitize_comment(name));
        }

        let mut line = String::from("\t\t");

        if let Some(src) = rule.option("src") {
            if !src.is_empty() {
                validate::interface_name(src)?;
                let _ = write!(line, "iifname \"{src}\" ");
            }
        }

        if let Some(dest) = rule.option("dest") {
            if !dest.is_empty() {
                validate::interface_name(dest)?;
                let _ = write!(line, "oifname \"{dest}\" ");
            }
        }

        if let Some(proto) = rule.option("proto") {
            if !proto.is_empty() {
                validate::protocol(proto)?;
                let _ = write!(line, "{} ", proto.to_ascii_lowercase());
            }
        }

        if let Some(dest_port) = rule.option("dest_port") {
            if !dest_port.is_empty() {
                validate::port(dest_port)?;
                let _ = write!(line, "dport {dest_port} ");
            }
        }

        if let Some(src_port) = rule.option("src_port") {
            if !src_port.is_empty() {
                validate::port(src_port)?;
                let _ = write!(line, "sport {src_port} ");
            }
        }

        let target = rule.option("target").unwrap_or("accept");
        validate::target(target)?;
        line.push_str(&target.to_ascii_lowercase());

        out.push_str(&line);
        out.push('\n');
    }

    out.push_str("\n\t\t# Drop invalid\n");
    out.push_str("\t\tct state invalid drop\n");
    out.push_str("\t}\n\n");

    // Output chain
    out.push_str("\tchain output {\n");
    let _ = writeln!(
        out,
        "\t\ttype filter hook output priority filter; policy {output_policy};"
    );
    out.push_str("\t}\n\n");

    // NAT chains
    out.push_str("\tchain prerouting {\n");
    out.push_str("\t\ttype nat hook prerouting priority dstnat; policy accept;\n");
    out.push_str("\t}\n\n");

    out.push_str("\tchain postrouting {\n");
    out.push_str("\t\ttype nat hook postrouting priority srcnat; policy accept;\n\n");

    for zone in doc.sections_by_type("zone") {
        if zone.option("masq") != Some("1") {
            continue;
        }
        if let Some(name) = zone.option("name") {
            let _ = writeln!(
                out,
                "\t\t# Masquerade for zone: {}",
                validate::sanitize_comment(name)
            );
        }
        if let Some(networks) = zone.list("network") {
            for network in networks {
                validate::interface_name(network)?;
                let _ = writeln!(out, "\t\toifname \"{network}\" masquerade");
            }
        }
    }

    out.push_str("\t}\n");
    out.push_str("}\n");

    Ok(out)
}
