use super::{HostProbe, ProbeError};
use std::fs;
use std::process::Command;
use tracing::debug;

type Step<P> = fn(&mut P) -> Option<String>;

/// Ordered list of detection steps; the first one that yields a value wins.
pub struct FallbackChain<P: ?Sized> {
    what: &'static str,
    steps: Vec<(&'static str, Step<P>)>,
}

impl<P: ?Sized> FallbackChain<P> {
    pub fn new(what: &'static str) -> Self {
        Self {
            what,
            steps: Vec::new(),
        }
    }

    pub fn then(mut self, name: &'static str, step: Step<P>) -> Self {
        self.steps.push((name, step));
        self
    }

    pub fn resolve(&self, probe: &mut P, default: &str) -> String {
        for (name, step) in &self.steps {
            if let Some(value) = step(probe) {
                debug!(what = self.what, source = name, value = %value, "значение определено");
                return value;
            }
        }
        debug!(what = self.what, default, "используется значение по умолчанию");
        default.to_string()
    }
}

pub fn resolve_cpu_model<P: HostProbe + ?Sized>(probe: &mut P) -> String {
    FallbackChain::new("cpu_model")
        .then("sysinfo", |p: &mut P| {
            p.cpu_info().ok().map(|c| c.model).and_then(non_empty)
        })
        .then("lscpu", |p: &mut P| {
            p.lscpu().ok().as_deref().and_then(parse_lscpu_model)
        })
        .resolve(probe, std::env::consts::ARCH)
}

pub fn resolve_virtualization<P: HostProbe + ?Sized>(probe: &mut P) -> String {
    FallbackChain::new("virtualization")
        .then("/sys/hypervisor/type", |p: &mut P| {
            p.hypervisor_type().ok().as_deref().and_then(normalize_virt)
        })
        .then("systemd-detect-virt", |p: &mut P| {
            p.detect_virt().ok().as_deref().and_then(normalize_virt)
        })
        .resolve(probe, "Physical")
}

pub fn resolve_distribution<P: HostProbe + ?Sized>(probe: &mut P) -> String {
    probe
        .os_release()
        .ok()
        .as_deref()
        .and_then(parse_os_release)
        .unwrap_or_else(|| std::env::consts::OS.to_string())
}

/// `<ID>-<VERSION_ID>` from an os-release file, or just `<ID>` for rolling releases.
pub fn parse_os_release(text: &str) -> Option<String> {
    let mut id = None;
    let mut version = None;
    for line in text.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches(|c: char| c == '"' || c == '\'');
        match key {
            "ID" => id = non_empty(value.to_string()),
            "VERSION_ID" => version = non_empty(value.to_string()),
            _ => {}
        }
    }

    let id = id?;
    Some(match version {
        Some(version) => format!("{id}-{version}"),
        None => id,
    })
}

pub fn parse_lscpu_model(text: &str) -> Option<String> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim() == "Model name")
        .and_then(|(_, value)| non_empty(value.trim().to_string()))
}

fn normalize_virt(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return None;
    }
    Some(value.to_uppercase())
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub(crate) fn read_file(path: &str) -> Result<String, ProbeError> {
    fs::read_to_string(path).map_err(|source| ProbeError::Read {
        path: path.to_string(),
        source,
    })
}

pub(crate) fn run_command(program: &str, args: &[&str]) -> Result<String, ProbeError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ProbeError::Spawn {
            command: program.to_string(),
            source,
        })?;
    if !output.status.success() {
        return Err(ProbeError::ExitStatus {
            command: program.to_string(),
            code: output.status.code(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::tests::MockProbe;
    use crate::collectors::CpuInfo;

    #[test]
    fn os_release_id_and_version() {
        let text = "NAME=\"Ubuntu\"\nVERSION_ID=\"22.04\"\nID=ubuntu\nID_LIKE=debian\n";
        assert_eq!(parse_os_release(text).as_deref(), Some("ubuntu-22.04"));
    }

    #[test]
    fn os_release_without_version_is_bare_id() {
        let text = "NAME=\"Arch Linux\"\nID=arch\nBUILD_ID=rolling\n";
        assert_eq!(parse_os_release(text).as_deref(), Some("arch"));
    }

    #[test]
    fn os_release_without_id_is_none() {
        assert_eq!(parse_os_release("VERSION_ID=1\n"), None);
        assert_eq!(parse_os_release(""), None);
    }

    #[test]
    fn distribution_falls_back_to_os_family() {
        let mut probe = MockProbe::default();
        assert_eq!(resolve_distribution(&mut probe), std::env::consts::OS);
    }

    #[test]
    fn lscpu_model_line_is_parsed() {
        let text = "Architecture:        x86_64\nModel name:          AMD Ryzen 7 5800X 8-Core Processor\nBIOS Model name:  pc\n";
        assert_eq!(
            parse_lscpu_model(text).as_deref(),
            Some("AMD Ryzen 7 5800X 8-Core Processor")
        );
        assert_eq!(parse_lscpu_model("Architecture: aarch64\n"), None);
    }

    #[test]
    fn cpu_model_prefers_sysinfo_then_lscpu() {
        let mut probe = MockProbe {
            cpu: Some(CpuInfo {
                model: "  ".to_string(),
                logical_cores: 2,
            }),
            lscpu: Some("Model name: Cortex-A72\n".to_string()),
            ..MockProbe::default()
        };
        assert_eq!(resolve_cpu_model(&mut probe), "Cortex-A72");

        probe.cpu = Some(CpuInfo {
            model: "Apple M2".to_string(),
            logical_cores: 8,
        });
        assert_eq!(resolve_cpu_model(&mut probe), "Apple M2");
    }

    #[test]
    fn cpu_model_defaults_to_architecture() {
        let mut probe = MockProbe::default();
        assert_eq!(resolve_cpu_model(&mut probe), std::env::consts::ARCH);
    }

    #[test]
    fn virtualization_none_means_physical() {
        let mut probe = MockProbe {
            detect_virt: Some("none\n".to_string()),
            ..MockProbe::default()
        };
        assert_eq!(resolve_virtualization(&mut probe), "Physical");
    }

    #[test]
    fn virtualization_is_upper_cased() {
        let mut probe = MockProbe {
            detect_virt: Some("kvm\n".to_string()),
            ..MockProbe::default()
        };
        assert_eq!(resolve_virtualization(&mut probe), "KVM");

        probe.hypervisor = Some("xen\n".to_string());
        assert_eq!(resolve_virtualization(&mut probe), "XEN");
    }

    #[test]
    fn virtualization_without_detector_is_physical() {
        let mut probe = MockProbe::default();
        assert_eq!(resolve_virtualization(&mut probe), "Physical");
    }

    #[test]
    fn missing_command_is_spawn_error() {
        let err = run_command("hostsnap-definitely-missing-binary", &[]).unwrap_err();
        assert!(matches!(err, ProbeError::Spawn { .. }));
    }
}
