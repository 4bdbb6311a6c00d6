//! DHCP/DNS applier
//!
//! Renders the `dhcp` configuration document into a dnsmasq configuration
//! file, replaces the file atomically, and restarts the daemon. Pool
//! `start`/`limit` values are offsets within the /24 of the pool
//! interface's static address, which is looked up in the `network`
//! document; a pool whose interface has no static IPv4 address is
//! rejected rather than guessing a base.
//!
//! Rollback is not captured here: rolling back the surrounding transaction
//! restores the prior configuration file and re-applies it.

use crate::appliers::Applier;
use crate::cmd::{run_checked, run_unchecked};
use crate::ctx::ApplyContext;
use netforge_core::errors::{validation, Result};
use netforge_core::model::{ConfigDocument, Section};
use netforge_core::validate;
use netforge_store::fsutil::atomic_write;
use netforge_store::ConfigStore;
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Default location of the rendered daemon configuration
pub const DEFAULT_CONF_PATH: &str = "/tmp/dnsmasq.conf";

/// Applies DHCP/DNS configuration through dnsmasq
pub struct DhcpApplier {
    /// Used to resolve pool base addresses from the network document
    store: Arc<ConfigStore>,
    conf_path: PathBuf,
}

impl DhcpApplier {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self {
            store,
            conf_path: PathBuf::from(DEFAULT_CONF_PATH),
        }
    }

    /// Override the rendered configuration path (used by tests)
    pub fn with_conf_path(mut self, conf_path: impl Into<PathBuf>) -> Self {
        self.conf_path = conf_path.into();
        self
    }
}

impl Applier for DhcpApplier {
    fn name(&self) -> &'static str {
        "dhcp"
    }

    fn apply(&mut self, ctx: &ApplyContext, doc: &ConfigDocument) -> Result<()> {
        let network = self.store.load("network")?;
        let rendered = render_dnsmasq(doc, &network)?;

        atomic_write(&self.conf_path, rendered.as_bytes())?;
        tracing::info!(path = %self.conf_path.display(), "wrote dnsmasq configuration");

        ctx.check()?;

        // Not running is fine; we are about to start it
        let _ = run_unchecked(ctx, "killall", &["dnsmasq"]);

        let conf = self.conf_path.display().to_string();
        run_checked(ctx, "dnsmasq", &["-C", &conf])?;
        tracing::info!("dnsmasq restarted");
        Ok(())
    }

    fn validate(&mut self, ctx: &ApplyContext) -> Result<()> {
        run_checked(ctx, "pidof", &["dnsmasq"]).map(|_| ())
    }

    fn rollback(&mut self, _ctx: &ApplyContext) -> Result<()> {
        // The transaction restores the prior config file and re-applies it;
        // there is no separately captured daemon state.
        tracing::debug!("dhcp rollback handled by transaction-level restore");
        Ok(())
    }
}

/// Render a dnsmasq configuration from the dhcp document
///
/// The `network` document supplies the /24 base address for each pool's
/// `start`/`limit` offsets.
pub fn render_dnsmasq(doc: &ConfigDocument, network: &ConfigDocument) -> Result<String> {
    let mut out = String::new();

    for section in doc.sections_by_type("dnsmasq") {
        write_global_options(&mut out, section);
    }

    for section in doc.sections_by_type("dhcp") {
        write_pool(&mut out, section, network)?;
    }

    for section in doc.sections_by_type("host") {
        write_static_lease(&mut out, section)?;
    }

    Ok(out)
}

/// Flag options set with `1` and their dnsmasq directives
const GLOBAL_FLAGS: &[(&str, &str)] = &[
    ("domainneeded", "domain-needed"),
    ("boguspriv", "bogus-priv"),
    ("localise_queries", "localise-queries"),
    ("expandhosts", "expand-hosts"),
    ("authoritative", "authoritative"),
    ("readethers", "read-ethers"),
    ("nonegcache", "no-negcache"),
    ("localservice", "local-service"),
];

/// Valued options and their dnsmasq directives
const GLOBAL_VALUES: &[(&str, &str)] = &[
    ("local", "local"),
    ("domain", "domain"),
    ("leasefile", "dhcp-leasefile"),
    ("resolvfile", "resolv-file"),
];

fn write_global_options(out: &mut String, section: &Section) {
    for (key, directive) in GLOBAL_FLAGS {
        if section.option(key) == Some("1") {
            let _ = writeln!(out, "{directive}");
        }
    }
    for (key, directive) in GLOBAL_VALUES {
        if let Some(value) = section.option(key) {
            let _ = writeln!(out, "{directive}={value}");
        }
    }
}

fn write_pool(out: &mut String, section: &Section, network: &ConfigDocument) -> Result<()> {
    let Some(iface) = section.option("interface") else {
        return Ok(());
    };
    validate::interface_name(iface)?;

    if section.option("ignore") == Some("1") {
        let _ = writeln!(out, "no-dhcp-interface={iface}");
        return Ok(());
    }

    let start = section.option("start");
    let limit = section.option("limit");

    if let (Some(start), Some(limit)) = (start, limit) {
        let base = pool_base(network, iface)?;
        let start: u32 = start
            .parse()
            .map_err(|_| validation("start", start))?;
        let limit: u32 = limit
            .parse()
            .map_err(|_| validation("limit", limit))?;

        // Offsets must stay within the interface's /24
        if start == 0 || start > 254 {
            return Err(validation("start", start.to_string()));
        }
        if limit == 0 || start + limit - 1 > 254 {
            return Err(validation("limit", limit.to_string()));
        }

        let mut range = format!(
            "dhcp-range={iface},{base}.{start},{base}.{}",
            start + limit - 1
        );
        if let Some(leasetime) = section.option("leasetime") {
            let _ = write!(range, ",{leasetime}");
        }
        let _ = writeln!(out, "{range}");
    }

    if let Some(options) = section.list("dhcp_option") {
        for option in options {
            let _ = writeln!(out, "dhcp-option={iface},{option}");
        }
    }

    Ok(())
}

fn write_static_lease(out: &mut String, section: &Section) -> Result<()> {
    let (Some(mac), Some(ip)) = (section.option("mac"), section.option("ip")) else {
        return Ok(());
    };
    validate::mac_address(mac)?;
    validate::ip_address(ip)?;

    let name = section.option("name").or_else(|| section.option("hostname"));
    match name {
        Some(name) => {
            validate::hostname(name)?;
            let _ = writeln!(out, "dhcp-host={mac},{ip},{name}");
        }
        None => {
            let _ = writeln!(out, "dhcp-host={mac},{ip}");
        }
    }
    Ok(())
}

/// Look up the /24 base (`a.b.c`) for a pool interface
///
/// The interface must carry a static IPv4 address in the network document;
/// anything else makes the pool's absolute range ambiguous.
fn pool_base(network: &ConfigDocument, iface: &str) -> Result<String> {
    let section = network
        .section("interface", iface)
        .ok_or_else(|| validation("interface", iface))?;

    let ipaddr = section
        .option("ipaddr")
        .ok_or_else(|| validation("interface", iface))?;

    let addr: std::net::Ipv4Addr = ipaddr
        .parse()
        .map_err(|_| validation("ipaddr", ipaddr))?;

    let octets = addr.octets();
    Ok(format!("{}.{}.{}", octets[0], octets[1], octets[2]))
}
