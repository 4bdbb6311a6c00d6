//! Network applier
//!
//! Translates `interface` sections into kernel state via the `ip` tool:
//! static addressing (flush, add address, link up, optional default
//! route), DHCP client management, or link down. Pre-apply address/link
//! state is captured per interface as an opaque blob for rollback.

use crate::appliers::Applier;
use crate::cmd::{run_checked, run_unchecked};
use crate::ctx::ApplyContext;
use netforge_core::errors::{validation, Result};
use netforge_core::model::{ConfigDocument, Section};
use netforge_core::validate;
use std::collections::HashMap;

/// Applies per-interface network configuration
pub struct NetworkApplier {
    /// Captured `ip addr show` output per interface, keyed by name
    previous_state: HashMap<String, String>,
}

impl NetworkApplier {
    pub fn new() -> Self {
        Self {
            previous_state: HashMap::new(),
        }
    }

    fn save_interface_state(&mut self, ctx: &ApplyContext, iface: &str) -> Result<()> {
        let output = run_checked(ctx, "ip", &["addr", "show", "dev", iface])?;
        self.previous_state.insert(iface.to_string(), output.stdout);
        Ok(())
    }

    fn apply_interface(&self, ctx: &ApplyContext, iface: &str, section: &Section) -> Result<()> {
        match section.option("proto") {
            Some("static") => self.apply_static(ctx, iface, section),
            Some("dhcp") => self.apply_dhcp(ctx, iface),
            Some("none") => self.apply_none(ctx, iface),
            Some(other) => Err(validation("proto", other)),
            None => Err(validation("proto", "(missing)")),
        }
    }

    fn apply_static(&self, ctx: &ApplyContext, iface: &str, section: &Section) -> Result<()> {
        let ipaddr = section
            .option("ipaddr")
            .ok_or_else(|| validation("ipaddr", "(missing)"))?;
        let netmask = section
            .option("netmask")
            .ok_or_else(|| validation("netmask", "(missing)"))?;

        validate::ip_address(ipaddr)?;
        validate::netmask(netmask)?;

        run_checked(ctx, "ip", &["addr", "flush", "dev", iface])?;

        let cidr = validate::netmask_to_cidr(netmask);
        let addr = format!("{ipaddr}/{cidr}");
        run_checked(ctx, "ip", &["addr", "add", &addr, "dev", iface])?;

        run_checked(ctx, "ip", &["link", "set", iface, "up"])?;

        if let Some(gateway) = section.option("gateway") {
            validate::ip_address(gateway)?;

            // Replace any existing default route; absence is not an error
            let _ = run_unchecked(ctx, "ip", &["route", "del", "default"]);

            let result = run_checked(
                ctx,
                "ip",
                &["route", "add", "default", "via", gateway, "dev", iface],
            );
            if let Err(e) = result {
                // The kernel reports an already-present route as "File
                // exists"; that outcome is the state we wanted.
                if !e.to_string().contains("File exists") {
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    fn apply_dhcp(&self, ctx: &ApplyContext, iface: &str) -> Result<()> {
        run_checked(ctx, "ip", &["link", "set", iface, "up"])?;

        // Gracefully release any existing lease before starting a client
        let _ = run_unchecked(ctx, "dhclient", &["-r", iface]);

        run_checked(ctx, "dhclient", &[iface])?;
        Ok(())
    }

    fn apply_none(&self, ctx: &ApplyContext, iface: &str) -> Result<()> {
        run_checked(ctx, "ip", &["link", "set", iface, "down"])?;
        Ok(())
    }
}

impl Default for NetworkApplier {
    fn default() -> Self {
        Self::new()
    }
}

impl Applier for NetworkApplier {
    fn name(&self) -> &'static str {
        "network"
    }

    fn apply(&mut self, ctx: &ApplyContext, doc: &ConfigDocument) -> Result<()> {
        for section in doc.sections_by_type("interface") {
            ctx.check()?;

            let iface = section.name();
            if iface.is_empty() {
                continue;
            }
            validate::interface_name(iface)?;

            if let Err(e) = self.save_interface_state(ctx, iface) {
                // Rollback simply has less to restore; proceed
                tracing::warn!(interface = %iface, error = %e, "failed to save interface state");
            }

            tracing::info!(interface = %iface, "applying interface configuration");
            self.apply_interface(ctx, iface, section)?;
        }
        Ok(())
    }

    fn validate(&mut self, _ctx: &ApplyContext) -> Result<()> {
        // The apply path already fails when an interface cannot be brought
        // up; no further live inspection is performed here.
        Ok(())
    }

    fn rollback(&mut self, ctx: &ApplyContext) -> Result<()> {
        tracing::info!(interfaces = self.previous_state.len(), "starting network rollback");

        for (iface, state) in &self.previous_state {
            ctx.check()?;

            tracing::debug!(interface = %iface, state_len = state.len(), "restoring interface");

            if let Err(e) = run_checked(ctx, "ip", &["addr", "flush", "dev", iface]) {
                tracing::warn!(interface = %iface, error = %e, "failed to flush interface during rollback");
            }
            if let Err(e) = run_checked(ctx, "ip", &["link", "set", iface, "down"]) {
                tracing::warn!(interface = %iface, error = %e, "failed to bring interface down during rollback");
            }
        }

        tracing::info!("network rollback completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netforge_core::codec::parse;

    fn interface_doc(body: &str) -> ConfigDocument {
        parse(body).unwrap()
    }

    #[test]
    fn test_invalid_interface_name_rejected_before_any_command() {
        let mut applier = NetworkApplier::new();
        let ctx = ApplyContext::background();
        let doc = interface_doc("config interface 'wan; reboot'\n\toption proto 'static'\n");

        let err = applier.apply(&ctx, &doc).unwrap_err();
        assert_eq!(err.code(), "ERR_VALIDATION");
    }

    #[test]
    fn test_unknown_proto_rejected() {
        let applier = NetworkApplier::new();
        let ctx = ApplyContext::background();
        let doc = interface_doc("config interface 'wan'\n\toption proto 'pppoe'\n");
        let section = doc.section("interface", "wan").unwrap();

        let err = applier.apply_interface(&ctx, "wan", section).unwrap_err();
        assert_eq!(err.code(), "ERR_VALIDATION");
    }

    #[test]
    fn test_static_requires_ipaddr_and_netmask() {
        let applier = NetworkApplier::new();
        let ctx = ApplyContext::background();
        let doc = interface_doc("config interface 'wan'\n\toption proto 'static'\n");
        let section = doc.section("interface", "wan").unwrap();

        let err = applier.apply_interface(&ctx, "wan", section).unwrap_err();
        assert_eq!(err.code(), "ERR_VALIDATION");
    }

    #[test]
    fn test_static_rejects_malformed_address() {
        let applier = NetworkApplier::new();
        let ctx = ApplyContext::background();
        let doc = interface_doc(
            "config interface 'wan'\n\toption proto 'static'\n\toption ipaddr '999.1.1.1'\n\toption netmask '255.255.255.0'\n",
        );
        let section = doc.section("interface", "wan").unwrap();

        let err = applier.apply_interface(&ctx, "wan", section).unwrap_err();
        assert_eq!(err.code(), "ERR_VALIDATION");
    }

    #[test]
    fn test_anonymous_interface_sections_skipped() {
        let mut applier = NetworkApplier::new();
        let ctx = ApplyContext::background();
        let doc = interface_doc("config interface\n\toption proto 'static'\n");

        // No name means no system commands run at all
        applier.apply(&ctx, &doc).unwrap();
        assert!(applier.previous_state.is_empty());
    }

    #[test]
    fn test_validate_is_unconditional_ok() {
        let mut applier = NetworkApplier::new();
        let ctx = ApplyContext::background();
        applier.validate(&ctx).unwrap();
    }
}
