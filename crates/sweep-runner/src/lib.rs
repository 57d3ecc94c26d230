use std::fmt;
use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

const THREADS_VAR: &str = "EXPERIMENT_THREADS";
const STREAMS_VAR: &str = "EXPERIMENT_STREAMS";
const THROUGHPUT_MARKER: &str = "throughput";
const TMP_LOG_NAME: &str = "tmp.log";
const LOG_SEPARATOR_WIDTH: usize = 80;
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(200);

const NGT_LAUNCHER: &str = "mpirun";
const FRAMEWORK_LAUNCHER: &str = "cmsenv_mpirun";
const FRAMEWORK_OOB_EXCLUDE: &str = "enp4s0f4u1u2c2";
const NVML_PRELOAD: &str = "/usr/lib64/libnvidia-ml.so.1";
const NGT_HOSTFILE: &str = "/etc/mpi/hostfile";
const OPENMPI_SSH_AGENT_SCRIPT: &str = "env_ompi_kubexec.sh";
const MPICH_LAUNCHER_SCRIPT: &str = "env_mpich_kubexec.sh";
const SHARED_TRANSPORTS: &str = "sm,self";
const MULTI_PROGRAM_SEPARATOR: &str = ":";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("scenario '{label}': remote descriptor is set but no launcher is configured")]
    MissingLauncher { label: String },
    #[error("scenario '{label}': {role} descriptor not found: {}", .path.display())]
    DescriptorNotFound {
        label: String,
        role: Role,
        path: PathBuf,
    },
    #[error("scenario '{label}': cpu affinity for the {role} role is empty")]
    EmptyAffinity { label: String, role: Role },
    #[error("scenario '{label}': no launch grammar for a paired run in {environment} without a launcher")]
    UnsupportedLaunch {
        label: String,
        environment: Environment,
    },
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to read sweep plan {}: {}", .path.display(), .source)]
    PlanRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse sweep plan {}: {}", .path.display(), .source)]
    PlanParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("benchmark command exited with status {status}")]
    Execution { status: i32 },
    #[error("benchmark command did not finish within {secs}s")]
    Timeout { secs: u64 },
    #[error("no line containing 'throughput' in {}", .path.display())]
    MissingMetric { path: PathBuf },
    #[error("throughput line in {} has no decimal value: {line}", .path.display())]
    MalformedMetric { path: PathBuf, line: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Environment {
    FrameworkHost,
    Ngt,
    NgtMpi,
}

impl Environment {
    // The NGT environments never place ranks themselves: the hostfile and the
    // kubexec indirection scripts do.
    fn uses_hostfile(self) -> bool {
        matches!(self, Environment::Ngt | Environment::NgtMpi)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Environment::FrameworkHost => "framework-host",
            Environment::Ngt => "ngt",
            Environment::NgtMpi => "ngt-mpi",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Launcher {
    OpenMpi,
    Mpich,
}

impl Launcher {
    pub fn log_token(self) -> &'static str {
        match self {
            Launcher::OpenMpi => "OpenMPI",
            Launcher::Mpich => "MPICH",
        }
    }
}

impl fmt::Display for Launcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.log_token())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Local,
    Remote,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Local => "local",
            Role::Remote => "remote",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum GpuVisibility {
    All,
    Devices(String),
}

impl GpuVisibility {
    // "all" leaves the device list untouched; any explicit string restricts it,
    // and the empty string hides every device (cpu-only runs).
    pub fn restriction(&self) -> Option<&str> {
        match self {
            GpuVisibility::All => None,
            GpuVisibility::Devices(devices) => Some(devices),
        }
    }
}

impl From<String> for GpuVisibility {
    fn from(value: String) -> Self {
        if value == "all" {
            GpuVisibility::All
        } else {
            GpuVisibility::Devices(value)
        }
    }
}

impl Default for GpuVisibility {
    fn default() -> Self {
        GpuVisibility::All
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "(u32, u32)")]
pub struct SweepPoint {
    pub threads: u32,
    pub streams: u32,
}

impl From<(u32, u32)> for SweepPoint {
    fn from((threads, streams): (u32, u32)) -> Self {
        Self { threads, streams }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweepPlan {
    #[serde(flatten)]
    pub control: RunControl,
    pub scenarios: Vec<Scenario>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunControl {
    #[serde(default)]
    pub launcher: Option<Launcher>,
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub first_pair_only: bool,
    #[serde(default)]
    pub first_run_index: u32,
    #[serde(default = "default_last_run_index")]
    pub last_run_index: u32,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default)]
    pub script_dir: PathBuf,
    #[serde(default)]
    pub timeout_secs: u64,
}

fn default_program() -> String {
    "cmsRun".to_string()
}

fn default_last_run_index() -> u32 {
    1
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub label: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub environment: Environment,
    pub local_descriptor: PathBuf,
    #[serde(default)]
    pub remote_descriptor: Option<PathBuf>,
    #[serde(default)]
    pub host_local: String,
    #[serde(default)]
    pub host_remote: String,
    #[serde(default)]
    pub same_machine: bool,
    #[serde(default = "default_transports")]
    pub transports: Vec<String>,
    #[serde(default)]
    pub net_device_local: Option<String>,
    #[serde(default)]
    pub net_device_remote: Option<String>,
    #[serde(default)]
    pub gpus_local: GpuVisibility,
    #[serde(default)]
    pub gpus_remote: GpuVisibility,
    #[serde(default)]
    pub cpu_base_local: usize,
    #[serde(default)]
    pub cpu_base_remote: usize,
    pub sweep_points: Vec<SweepPoint>,
}

fn default_true() -> bool {
    true
}

fn default_transports() -> Vec<String> {
    vec!["all".to_string()]
}

pub fn load_plan(path: &Path) -> Result<SweepPlan, SweepError> {
    let raw = fs::read_to_string(path).map_err(|source| SweepError::PlanRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mut plan: SweepPlan =
        serde_yaml::from_str(&raw).map_err(|source| SweepError::PlanParse {
            path: path.to_path_buf(),
            source,
        })?;

    let plan_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
    plan.control.log_dir = resolve_against(&plan_dir, &plan.control.log_dir);
    plan.control.script_dir = if plan.control.script_dir.as_os_str().is_empty() {
        plan_dir.clone()
    } else {
        resolve_against(&plan_dir, &plan.control.script_dir)
    };
    for scenario in &mut plan.scenarios {
        scenario.local_descriptor = resolve_against(&plan_dir, &scenario.local_descriptor);
        if let Some(remote) = scenario.remote_descriptor.take() {
            scenario.remote_descriptor = Some(resolve_against(&plan_dir, &remote));
        }
    }
    Ok(plan)
}

fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub environment: Environment,
    pub launcher: Option<Launcher>,
    pub program: String,
    pub local_descriptor: PathBuf,
    pub remote_descriptor: Option<PathBuf>,
    pub is_same_machine: bool,
    pub host_local: String,
    pub host_remote: String,
    pub transports: Vec<String>,
    pub net_device_local: Option<String>,
    pub net_device_remote: Option<String>,
    pub cpus_local: Vec<usize>,
    pub cpus_remote: Vec<usize>,
    pub gpus_local: GpuVisibility,
    pub gpus_remote: GpuVisibility,
    pub sweep_point: SweepPoint,
    pub run_index: u32,
    pub label: String,
    pub script_dir: PathBuf,
}

impl RunConfig {
    pub fn snapshot(
        scenario: &Scenario,
        control: &RunControl,
        point: SweepPoint,
        run_index: u32,
    ) -> Self {
        let paired = scenario.remote_descriptor.is_some();
        Self {
            environment: scenario.environment,
            launcher: if paired { control.launcher } else { None },
            program: control.program.clone(),
            local_descriptor: scenario.local_descriptor.clone(),
            remote_descriptor: scenario.remote_descriptor.clone(),
            is_same_machine: scenario.same_machine,
            host_local: scenario.host_local.clone(),
            host_remote: scenario.host_remote.clone(),
            transports: scenario.transports.clone(),
            net_device_local: scenario.net_device_local.clone(),
            net_device_remote: scenario.net_device_remote.clone(),
            cpus_local: affinity_block(scenario.cpu_base_local, point.threads),
            cpus_remote: if paired {
                affinity_block(scenario.cpu_base_remote, point.threads)
            } else {
                Vec::new()
            },
            gpus_local: scenario.gpus_local.clone(),
            gpus_remote: scenario.gpus_remote.clone(),
            sweep_point: point,
            run_index,
            label: scenario.label.clone(),
            script_dir: control.script_dir.clone(),
        }
    }

    pub fn is_paired(&self) -> bool {
        self.remote_descriptor.is_some()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(remote) = &self.remote_descriptor {
            if self.launcher.is_none() {
                return Err(ConfigError::MissingLauncher {
                    label: self.label.clone(),
                });
            }
            require_descriptor(&self.label, Role::Local, &self.local_descriptor)?;
            require_descriptor(&self.label, Role::Remote, remote)?;
            require_affinity(&self.label, Role::Local, &self.cpus_local)?;
            require_affinity(&self.label, Role::Remote, &self.cpus_remote)?;
        } else {
            require_descriptor(&self.label, Role::Local, &self.local_descriptor)?;
            require_affinity(&self.label, Role::Local, &self.cpus_local)?;
        }
        Ok(())
    }
}

fn require_descriptor(label: &str, role: Role, path: &Path) -> Result<(), ConfigError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ConfigError::DescriptorNotFound {
            label: label.to_string(),
            role,
            path: path.to_path_buf(),
        })
    }
}

fn require_affinity(label: &str, role: Role, cpus: &[usize]) -> Result<(), ConfigError> {
    if cpus.is_empty() {
        Err(ConfigError::EmptyAffinity {
            label: label.to_string(),
            role,
        })
    } else {
        Ok(())
    }
}

pub fn affinity_block(base: usize, threads: u32) -> Vec<usize> {
    (base..base + threads as usize).collect()
}

// Ordered list of optionally-absent entries, rendered to tokens at the end.
// Flags that do not apply are never emitted as bare names.
#[derive(Default)]
struct CommandSpec {
    parts: Vec<Option<String>>,
}

impl CommandSpec {
    fn push(&mut self, part: impl Into<String>) {
        self.parts.push(Some(part.into()));
    }

    fn push_flag(&mut self, flag: &str, value: Option<String>) {
        match value {
            Some(value) => {
                self.parts.push(Some(flag.to_string()));
                self.parts.push(Some(value));
            }
            None => self.parts.push(None),
        }
    }

    fn render(self) -> Vec<String> {
        self.parts
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect()
    }
}

pub fn build_command(config: &RunConfig) -> Result<Vec<String>, ConfigError> {
    let mut spec = CommandSpec::default();
    match (&config.remote_descriptor, config.launcher) {
        (None, _) => build_standalone(config, &mut spec),
        (Some(remote), Some(Launcher::OpenMpi)) => {
            build_openmpi(config, remote.clone(), &mut spec)
        }
        (Some(remote), Some(Launcher::Mpich)) => build_mpich(config, remote.clone(), &mut spec),
        (Some(_), None) => {
            return Err(ConfigError::UnsupportedLaunch {
                label: config.label.clone(),
                environment: config.environment,
            })
        }
    }
    Ok(spec.render())
}

fn build_standalone(config: &RunConfig, spec: &mut CommandSpec) {
    spec.push("env");
    spec.push(format!("{THREADS_VAR}={}", config.sweep_point.threads));
    spec.push("env");
    spec.push(format!("{STREAMS_VAR}={}", config.sweep_point.streams));
    spec.push_flag(
        "env",
        config
            .gpus_local
            .restriction()
            .map(|devices| format!("CUDA_VISIBLE_DEVICES={devices}")),
    );
    spec.push("numactl");
    spec.push(format!("--physcpubind={}", cpu_list(&config.cpus_local)));
    spec.push(config.program.clone());
    spec.push(config.local_descriptor.display().to_string());
}

fn build_openmpi(config: &RunConfig, remote: PathBuf, spec: &mut CommandSpec) {
    let hostfile = config.environment.uses_hostfile();
    if hostfile {
        spec.push("env");
        spec.push(format!("LD_PRELOAD={NVML_PRELOAD}"));
        spec.push(NGT_LAUNCHER);
    } else {
        spec.push(FRAMEWORK_LAUNCHER);
        spec.push("--mca");
        spec.push("oob_tcp_if_exclude");
        spec.push(FRAMEWORK_OOB_EXCLUDE);
    }
    if config.is_same_machine {
        // both ranks share one host: shared memory and loopback only
        spec.push("--mca");
        spec.push("pml");
        spec.push("ob1");
        spec.push("--mca");
        spec.push("btl");
        spec.push("vader,self,tcp");
    } else {
        spec.push("--mca");
        spec.push("pml");
        spec.push("ucx");
        spec.push("-x");
        spec.push(format!("UCX_TLS={}", config.transports.join(",")));
        spec.push("-x");
        spec.push("UCX_PROTO_INFO=y"); // shows which transports were negotiated
        spec.push("-x");
        spec.push("UCX_USE_MT_MUTEX=y");
        spec.push("-x");
        spec.push("UCX_RNDV_SCHEME=put_ppln");
    }
    if hostfile {
        spec.push("--hostfile");
        spec.push(NGT_HOSTFILE);
        spec.push("--prtemca");
        spec.push("plm_ssh_agent");
        spec.push(
            config
                .script_dir
                .join(OPENMPI_SSH_AGENT_SCRIPT)
                .display()
                .to_string(),
        );
    }
    spec.push("-x");
    spec.push(format!("{THREADS_VAR}={}", config.sweep_point.threads));
    spec.push("-x");
    spec.push(format!("{STREAMS_VAR}={}", config.sweep_point.streams));
    spec.push("--map-by");
    spec.push("node");
    openmpi_role(config, Role::Local, &config.local_descriptor, spec);
    spec.push(MULTI_PROGRAM_SEPARATOR);
    openmpi_role(config, Role::Remote, &remote, spec);
}

fn openmpi_role(config: &RunConfig, role: Role, descriptor: &Path, spec: &mut CommandSpec) {
    let (host, gpus, net_device, cpus) = role_fields(config, role);
    spec.push("-np");
    spec.push("1");
    if !config.environment.uses_hostfile() {
        spec.push("--host");
        spec.push(host.to_string());
    }
    spec.push_flag(
        "-x",
        gpus.restriction()
            .map(|devices| format!("CUDA_VISIBLE_DEVICES={devices}")),
    );
    if !config.is_same_machine {
        spec.push_flag(
            "-x",
            net_device.map(|device| format!("UCX_NET_DEVICES={device}")),
        );
    }
    spec.push("--bind-to");
    spec.push("none");
    spec.push("numactl");
    spec.push(format!("--physcpubind={}", cpu_list(cpus)));
    spec.push(config.program.clone());
    spec.push(descriptor.display().to_string());
}

fn build_mpich(config: &RunConfig, remote: PathBuf, spec: &mut CommandSpec) {
    let hostfile = config.environment.uses_hostfile();
    if hostfile {
        spec.push("env");
        spec.push(format!("LD_PRELOAD={NVML_PRELOAD}"));
        spec.push(NGT_LAUNCHER);
        spec.push("--launcher-exec");
        spec.push(
            config
                .script_dir
                .join(MPICH_LAUNCHER_SCRIPT)
                .display()
                .to_string(),
        );
    } else {
        spec.push(FRAMEWORK_LAUNCHER);
    }
    let transports = if config.is_same_machine {
        SHARED_TRANSPORTS.to_string()
    } else {
        config.transports.join(",")
    };
    spec.push("-genv");
    spec.push(format!("UCX_TLS={transports}"));
    spec.push("-genv");
    spec.push("UCX_LOG_LEVEL=info"); // shows which transports were negotiated
    spec.push("-genv");
    spec.push("UCX_RNDV_THRESH=inf");
    if !hostfile {
        spec.push("-hosts");
        spec.push(format!("{},{}", config.host_local, config.host_remote));
    }
    spec.push("--bind-to");
    spec.push("none");
    spec.push("-genv");
    spec.push(THREADS_VAR);
    spec.push(config.sweep_point.threads.to_string());
    spec.push("-genv");
    spec.push(STREAMS_VAR);
    spec.push(config.sweep_point.streams.to_string());
    if !config.is_same_machine {
        // one rank per node; a host may expose several sockets
        spec.push("-ppn");
        spec.push("1");
    }
    mpich_role(config, Role::Local, &config.local_descriptor, spec);
    spec.push(MULTI_PROGRAM_SEPARATOR);
    mpich_role(config, Role::Remote, &remote, spec);
}

fn mpich_role(config: &RunConfig, role: Role, descriptor: &Path, spec: &mut CommandSpec) {
    let (_, gpus, net_device, cpus) = role_fields(config, role);
    spec.push("-np");
    spec.push("1");
    spec.push_flag(
        "-env",
        gpus.restriction()
            .map(|devices| format!("CUDA_VISIBLE_DEVICES={devices}")),
    );
    if !config.is_same_machine {
        if let Some(device) = net_device {
            spec.push("-env");
            spec.push("UCX_NET_DEVICES");
            spec.push(device.to_string());
        }
    }
    spec.push("numactl");
    spec.push(format!("--physcpubind={}", cpu_list(cpus)));
    spec.push(config.program.clone());
    spec.push(descriptor.display().to_string());
}

fn role_fields<'a>(
    config: &'a RunConfig,
    role: Role,
) -> (&'a str, &'a GpuVisibility, Option<&'a str>, &'a [usize]) {
    match role {
        Role::Local => (
            &config.host_local,
            &config.gpus_local,
            config.net_device_local.as_deref(),
            &config.cpus_local,
        ),
        Role::Remote => (
            &config.host_remote,
            &config.gpus_remote,
            config.net_device_remote.as_deref(),
            &config.cpus_remote,
        ),
    }
}

fn cpu_list(cpus: &[usize]) -> String {
    cpus.iter()
        .map(|cpu| cpu.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn execute(
    command: &[String],
    log_path: &Path,
    timeout: Option<Duration>,
) -> Result<(), SweepError> {
    let command_line = command.join(" ");
    let mut log_file = File::create(log_path)?;
    writeln!(log_file, "Command:")?;
    writeln!(log_file, "{command_line}")?;
    writeln!(log_file, "{}", "-".repeat(LOG_SEPARATOR_WIDTH))?;
    log_file.flush()?;

    let stdout = log_file.try_clone()?;
    let stderr = log_file.try_clone()?;
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(&command_line)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .spawn()?;

    let status = match timeout {
        None => child.wait()?,
        Some(limit) => {
            let deadline = Instant::now() + limit;
            loop {
                if let Some(status) = child.try_wait()? {
                    break status;
                }
                if Instant::now() >= deadline {
                    child.kill()?;
                    let _ = child.wait();
                    return Err(SweepError::Timeout {
                        secs: limit.as_secs(),
                    });
                }
                thread::sleep(WAIT_POLL_INTERVAL);
            }
        }
    };
    if !status.success() {
        return Err(SweepError::Execution {
            status: status.code().unwrap_or(-1),
        });
    }
    Ok(())
}

pub fn extract_throughput(log_path: &Path) -> Result<u64, SweepError> {
    let contents = fs::read_to_string(log_path)?;
    let line = contents
        .lines()
        .find(|line| line.contains(THROUGHPUT_MARKER))
        .ok_or_else(|| SweepError::MissingMetric {
            path: log_path.to_path_buf(),
        })?;
    let value = find_decimal(line).ok_or_else(|| SweepError::MalformedMetric {
        path: log_path.to_path_buf(),
        line: line.to_string(),
    })?;
    // rounds half away from zero: 2043.5 reports as 2044
    Ok(value.round() as u64)
}

// First digits '.' digits run in the line; bare integers do not count.
fn find_decimal(line: &str) -> Option<f64> {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                return line[start..i].parse().ok();
            }
        } else {
            i += 1;
        }
    }
    None
}

pub fn canonical_log_name(config: &RunConfig) -> String {
    let launcher = match config.launcher {
        Some(launcher) => launcher.log_token(),
        None => "none",
    };
    format!(
        "{launcher}_{}_t{}_s{}_r{}.log",
        config.label, config.sweep_point.threads, config.sweep_point.streams, config.run_index
    )
}

#[derive(Debug)]
pub struct RunRecord {
    pub label: String,
    pub sweep_point: SweepPoint,
    pub run_index: u32,
    pub throughput: u64,
    pub log_path: PathBuf,
}

#[derive(Debug, Default)]
pub struct SweepSummary {
    pub completed: Vec<RunRecord>,
    pub commands_printed: usize,
}

pub fn run_sweep(plan: &SweepPlan) -> Result<SweepSummary, SweepError> {
    let control = &plan.control;
    fs::create_dir_all(&control.log_dir)?;
    let timeout = (control.timeout_secs > 0).then(|| Duration::from_secs(control.timeout_secs));
    let mut summary = SweepSummary::default();

    for run_index in control.first_run_index..control.last_run_index {
        for scenario in plan.scenarios.iter().filter(|scenario| scenario.enabled) {
            for point in &scenario.sweep_points {
                let config = RunConfig::snapshot(scenario, control, *point, run_index);
                config.validate()?;
                let command = build_command(&config)?;
                info!(
                    "run {}: {} [t,s] = [{},{}]",
                    run_index, config.label, point.threads, point.streams
                );
                if control.dry_run {
                    println!("{}", command.join(" "));
                    summary.commands_printed += 1;
                } else {
                    let tmp_log = control.log_dir.join(TMP_LOG_NAME);
                    debug!("command: {}", command.join(" "));
                    info!("logging to {}", tmp_log.display());
                    execute(&command, &tmp_log, timeout)?;
                    let throughput = extract_throughput(&tmp_log)?;
                    let final_log = control.log_dir.join(canonical_log_name(&config));
                    fs::rename(&tmp_log, &final_log)?;
                    info!(
                        "throughput this run: {} events/s ({})",
                        throughput,
                        final_log.display()
                    );
                    summary.completed.push(RunRecord {
                        label: config.label.clone(),
                        sweep_point: *point,
                        run_index,
                        throughput,
                        log_path: final_log,
                    });
                }
                if control.first_pair_only {
                    break;
                }
            }
        }
    }
    Ok(summary)
}

#[derive(Debug)]
pub struct PlanSummary {
    pub launcher: Option<Launcher>,
    pub program: String,
    pub first_run_index: u32,
    pub last_run_index: u32,
    pub log_dir: PathBuf,
    pub scenarios: Vec<ScenarioSummary>,
    pub total_runs: usize,
}

#[derive(Debug)]
pub struct ScenarioSummary {
    pub label: String,
    pub enabled: bool,
    pub environment: Environment,
    pub paired: bool,
    pub pair_count: usize,
}

pub fn describe_plan(plan: &SweepPlan) -> PlanSummary {
    let runs = plan
        .control
        .last_run_index
        .saturating_sub(plan.control.first_run_index) as usize;
    let mut scenarios = Vec::new();
    let mut total_runs = 0;
    for scenario in &plan.scenarios {
        let pair_count = scenario.sweep_points.len();
        let effective_pairs = if plan.control.first_pair_only {
            pair_count.min(1)
        } else {
            pair_count
        };
        if scenario.enabled {
            total_runs += effective_pairs * runs;
        }
        scenarios.push(ScenarioSummary {
            label: scenario.label.clone(),
            enabled: scenario.enabled,
            environment: scenario.environment,
            paired: scenario.remote_descriptor.is_some(),
            pair_count,
        });
    }
    PlanSummary {
        launcher: plan.control.launcher,
        program: plan.control.program.clone(),
        first_run_index: plan.control.first_run_index,
        last_run_index: plan.control.last_run_index,
        log_dir: plan.control.log_dir.clone(),
        scenarios,
        total_runs,
    }
}
