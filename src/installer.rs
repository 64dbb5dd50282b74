//! Package-manager dispatch for provisioning `git`.
//!
//! Each supported distribution family maps to exactly one package manager
//! with a non-interactive install invocation. Privilege escalation is
//! detected once (`sudo`, then `doas`) and prepended only when available.
//! The apt variant refreshes the package index once before the first
//! install; the one-time flag lives on the [`Installer`] itself rather than
//! in global state.

use crate::exec::Invocation;
use crate::host::{DistroFamily, HostClassification};
use crate::output;
use crate::retry::RetryPolicy;
use anyhow::Result;
use tracing::debug;

/// Package managers this tool knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    /// apt-get (Debian family).
    Apt,
    /// dnf, with microdnf/yum fallback (Fedora family).
    Dnf,
    /// zypper (SUSE family).
    Zypper,
    /// pacman (Arch family).
    Pacman,
    /// apk (Alpine).
    Apk,
}

impl PackageManager {
    /// The package manager for a distribution family, if one is supported.
    #[must_use]
    pub fn for_family(family: DistroFamily) -> Option<Self> {
        match family {
            DistroFamily::Debian => Some(Self::Apt),
            DistroFamily::Fedora => Some(Self::Dnf),
            DistroFamily::Suse => Some(Self::Zypper),
            DistroFamily::Arch => Some(Self::Pacman),
            DistroFamily::Alpine => Some(Self::Apk),
            DistroFamily::Unknown => None,
        }
    }

    /// Resolve the program name to execute for this manager.
    ///
    /// Fedora-family images ship one of dnf, microdnf or yum depending on
    /// how minimal the base image is; the first present on `PATH` wins.
    #[must_use]
    pub fn program(&self) -> String {
        match self {
            Self::Apt => "apt-get".to_string(),
            Self::Dnf => ["dnf", "microdnf", "yum"]
                .iter()
                .find(|candidate| which::which(candidate).is_ok())
                .unwrap_or(&"dnf")
                .to_string(),
            Self::Zypper => "zypper".to_string(),
            Self::Pacman => "pacman".to_string(),
            Self::Apk => "apk".to_string(),
        }
    }

    /// Non-interactive install invocation for the given packages.
    #[must_use]
    pub fn install_plan(&self, packages: &[&str]) -> Invocation {
        let program = self.program();
        let mut args: Vec<&str> = match self {
            Self::Apt => vec!["install", "-y", "--no-install-recommends"],
            Self::Dnf => vec!["install", "-y"],
            Self::Zypper => vec!["--non-interactive", "install"],
            Self::Pacman => vec!["-S", "--noconfirm", "--needed"],
            Self::Apk => vec!["add", "--no-cache"],
        };
        args.extend_from_slice(packages);
        Invocation::new(&program, &args)
    }

    /// Package-index refresh invocation, for managers that need one before
    /// the first install.
    #[must_use]
    pub fn update_plan(&self) -> Option<Invocation> {
        match self {
            Self::Apt => Some(Invocation::new("apt-get", &["update"])),
            _ => None,
        }
    }
}

/// Installs packages via the package manager matching the host distribution.
#[derive(Debug)]
pub struct Installer {
    /// Host classification driving the dispatch.
    host: HostClassification,
    /// Privilege-escalation wrapper, when one is available.
    escalation: Option<String>,
    /// Retry policy applied to network-facing invocations.
    retry: RetryPolicy,
    /// Whether the package index was already refreshed by this process.
    index_refreshed: bool,
}

impl Installer {
    /// Create an installer, auto-detecting privilege escalation.
    #[must_use]
    pub fn new(host: HostClassification) -> Self {
        Self::with_escalation(host, detect_escalation())
    }

    /// Create an installer with an explicit escalation wrapper (or none).
    #[must_use]
    pub fn with_escalation(host: HostClassification, escalation: Option<String>) -> Self {
        Self {
            host,
            escalation,
            retry: RetryPolicy::default(),
            index_refreshed: false,
        }
    }

    /// Replace the retry policy (shorter delays in tests).
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The invocations `install` would run for these packages, in order,
    /// given the current state of the one-time index-refresh flag.
    #[must_use]
    pub fn install_plans(&self, packages: &[&str]) -> Vec<Invocation> {
        let Some(manager) = PackageManager::for_family(self.host.distro) else {
            return Vec::new();
        };

        let mut plans = Vec::new();
        if !self.index_refreshed
            && let Some(update) = manager.update_plan()
        {
            plans.push(self.privileged(update));
        }
        plans.push(self.privileged(manager.install_plan(packages)));
        plans
    }

    /// Install packages via the dispatched package manager.
    ///
    /// Returns `Ok(false)` when no package manager is known for the host
    /// distribution; the caller decides whether that is fatal.
    ///
    /// # Errors
    ///
    /// Returns an error if a package-manager invocation still fails after
    /// all retries.
    pub fn install(&mut self, packages: &[&str]) -> Result<bool> {
        let Some(manager) = PackageManager::for_family(self.host.distro) else {
            return Ok(false);
        };

        if !self.index_refreshed
            && let Some(update) = manager.update_plan()
        {
            let update = self.privileged(update);
            self.retry.run(|| update.execute().map(drop))?;
            self.index_refreshed = true;
        }

        let install = self.privileged(manager.install_plan(packages));
        self.retry.run(|| install.execute().map(drop))?;
        Ok(true)
    }

    /// Make sure `git` is available, installing it if necessary.
    ///
    /// A host without git and without a supported package manager gets a
    /// warning and execution continues optimistically; the first git command
    /// will fail with a clear error if git really is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the installation itself fails.
    pub fn ensure_git(&mut self) -> Result<()> {
        if let Ok(path) = which::which("git") {
            debug!("git already present at {}", path.display());
            return Ok(());
        }

        output::info(&format!(
            "git not found, installing via package manager ({})",
            self.host
        ));

        if !self.install(&["git"])? {
            output::warning(&format!(
                "git is not installed and no package manager is known for {}; continuing anyway",
                self.host
            ));
        }

        Ok(())
    }

    /// Wrap an invocation in the detected escalation program, if any.
    fn privileged(&self, plan: Invocation) -> Invocation {
        match &self.escalation {
            Some(wrapper) => plan.escalated(wrapper),
            None => plan,
        }
    }

    #[cfg(test)]
    fn set_index_refreshed(&mut self, refreshed: bool) {
        self.index_refreshed = refreshed;
    }
}

/// Find a privilege-escalation wrapper on `PATH` (`sudo` preferred).
fn detect_escalation() -> Option<String> {
    ["sudo", "doas"]
        .iter()
        .find(|candidate| which::which(candidate).is_ok())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostOs;
    use rstest::rstest;

    fn linux(distro: DistroFamily) -> HostClassification {
        HostClassification {
            os: HostOs::Linux,
            distro,
        }
    }

    #[rstest]
    #[case(DistroFamily::Debian, PackageManager::Apt)]
    #[case(DistroFamily::Fedora, PackageManager::Dnf)]
    #[case(DistroFamily::Suse, PackageManager::Zypper)]
    #[case(DistroFamily::Arch, PackageManager::Pacman)]
    #[case(DistroFamily::Alpine, PackageManager::Apk)]
    fn test_each_family_dispatches_to_one_manager(
        #[case] family: DistroFamily,
        #[case] expected: PackageManager,
    ) {
        assert_eq!(PackageManager::for_family(family), Some(expected));
    }

    #[test]
    fn test_unknown_family_has_no_manager() {
        assert_eq!(PackageManager::for_family(DistroFamily::Unknown), None);
    }

    #[rstest]
    #[case(PackageManager::Apt, "apt-get", "install")]
    #[case(PackageManager::Zypper, "zypper", "--non-interactive")]
    #[case(PackageManager::Pacman, "pacman", "-S")]
    #[case(PackageManager::Apk, "apk", "add")]
    fn test_install_plan_shape(
        #[case] manager: PackageManager,
        #[case] program: &str,
        #[case] first_arg: &str,
    ) {
        let plan = manager.install_plan(&["git"]);
        assert_eq!(plan.program(), program);
        assert_eq!(plan.args()[0], first_arg);
        assert_eq!(plan.args().last().unwrap(), "git");
    }

    #[test]
    fn test_dnf_program_falls_back_within_family() {
        let program = PackageManager::Dnf.program();
        assert!(["dnf", "microdnf", "yum"].contains(&program.as_str()));
    }

    #[test]
    fn test_only_apt_refreshes_the_index() {
        assert!(PackageManager::Apt.update_plan().is_some());
        for manager in [
            PackageManager::Dnf,
            PackageManager::Zypper,
            PackageManager::Pacman,
            PackageManager::Apk,
        ] {
            assert_eq!(manager.update_plan(), None);
        }
    }

    #[test]
    fn test_apt_update_runs_once() {
        let mut installer = Installer::with_escalation(linux(DistroFamily::Debian), None);

        let plans = installer.install_plans(&["git"]);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].rendered(), "apt-get update");
        assert_eq!(
            plans[1].rendered(),
            "apt-get install -y --no-install-recommends git"
        );

        installer.set_index_refreshed(true);
        let plans = installer.install_plans(&["git"]);
        assert_eq!(plans.len(), 1);
        assert!(plans[0].rendered().starts_with("apt-get install"));
    }

    #[test]
    fn test_escalation_wraps_every_plan() {
        let installer =
            Installer::with_escalation(linux(DistroFamily::Alpine), Some("doas".to_string()));

        let plans = installer.install_plans(&["git"]);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].program(), "doas");
        assert_eq!(plans[0].args()[0], "apk");
    }

    #[test]
    fn test_unknown_family_yields_no_plans() {
        let installer = Installer::with_escalation(linux(DistroFamily::Unknown), None);
        assert!(installer.install_plans(&["git"]).is_empty());
    }
}
