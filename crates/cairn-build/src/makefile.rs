//! GNU make backend
//!
//! Each registered action becomes a set of rules in `<build-dir>/cairn.mk`.
//! Every component gets a phony rule under its own name; components that
//! produce a file also get a rule for that file. Prerequisites that produce
//! files are normal prerequisites, phony ones are order-only.

use crate::component::ComponentKind;
use crate::engine::{ActionHandle, BuildAction, BuildEngine};
use crate::error::{BuildError, BuildResult};
use cairn_config::{EngineConfig, Layout};
use cairn_package::{CommandOutput, CommandRunner, ShellCommand, SystemRunner};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the generated rules
pub const MAKEFILE_NAME: &str = "cairn.mk";

/// Renders actions as make rules and runs a make-like program over them
#[derive(Debug)]
pub struct MakefileEngine<R = SystemRunner> {
    runner: R,
    program: String,
    jobs: usize,
    build_dir: PathBuf,
    install_prefix: PathBuf,
    lib_dir: PathBuf,
    rules: Vec<String>,
    /// Target name to its output file, `None` for phony-only targets
    outputs: HashMap<String, Option<PathBuf>>,
    phony: Vec<String>,
    last_output: Option<CommandOutput>,
}

impl MakefileEngine<SystemRunner> {
    pub fn system(layout: &Layout, config: &EngineConfig) -> Self {
        Self::new(layout, config, SystemRunner)
    }
}

impl<R: CommandRunner> MakefileEngine<R> {
    pub fn new(layout: &Layout, config: &EngineConfig, runner: R) -> Self {
        let jobs = config.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        Self {
            runner,
            program: config.program.clone(),
            jobs: jobs.max(1),
            build_dir: layout.build_dir.clone(),
            install_prefix: layout.install_prefix.clone(),
            lib_dir: layout.lib_dir.clone(),
            rules: Vec::new(),
            outputs: HashMap::new(),
            phony: Vec::new(),
            last_output: None,
        }
    }

    /// Override the parallel job count
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn makefile_path(&self) -> PathBuf {
        self.build_dir.join(MAKEFILE_NAME)
    }

    /// Output of the last engine run
    pub fn last_output(&self) -> Option<&CommandOutput> {
        self.last_output.as_ref()
    }

    /// Full makefile text for everything registered so far
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("# Generated by cairn; changes are overwritten on the next build.\n\n");
        out.push_str("CC ?= cc\nAR ?= ar\n\n");
        out.push_str(".DEFAULT_GOAL := all\n");
        if !self.phony.is_empty() {
            let _ = writeln!(out, ".PHONY: {}", self.phony.join(" "));
        }
        for rule in &self.rules {
            out.push('\n');
            out.push_str(rule);
        }
        out
    }

    /// Write the makefile and return its path
    pub fn write(&self) -> BuildResult<PathBuf> {
        let path = self.makefile_path();
        fs::create_dir_all(&self.build_dir).map_err(|e| BuildError::io(&self.build_dir, e))?;
        fs::write(&path, self.render()).map_err(|e| BuildError::io(&path, e))?;
        debug!(makefile = %path.display(), rules = self.rules.len(), "wrote makefile");
        Ok(path)
    }

    fn prerequisite_lists(&self, action: &BuildAction) -> (Vec<String>, Vec<String>) {
        let mut normal = Vec::new();
        let mut order_only = Vec::new();
        for prereq in &action.prerequisites {
            match self.outputs.get(prereq) {
                Some(Some(file)) => normal.push(display(file)),
                _ => order_only.push(prereq.clone()),
            }
        }
        (normal, order_only)
    }

    fn render_action(&self, action: &BuildAction) -> String {
        let mut rule = String::new();
        let (normal, order_only) = self.prerequisite_lists(action);
        let all_prereqs: Vec<String> = action.prerequisites.clone();
        let output = action.output_file();

        let _ = writeln!(rule, "# {} ({})", action.target, action.kind);
        match &output {
            Some(file) => {
                let _ = writeln!(rule, "{}: {}\n", action.target, display(file));
            }
            None => {
                let _ = writeln!(rule, "{}:{}\n\t@:\n", action.target, order_only_suffix(&all_prereqs));
            }
        }

        let pic = matches!(action.kind, ComponentKind::SharedLibrary { .. });
        let objects = self.render_objects(&mut rule, action, &all_prereqs, pic);

        let Some(file) = output else {
            return rule;
        };
        let inputs: &[PathBuf] = match &action.kind {
            ComponentKind::Doc { inputs, .. } => inputs,
            _ => &[],
        };
        let target_line = format!(
            "{}: {}{}",
            display(&file),
            objects
                .iter()
                .chain(inputs)
                .map(|o| display(o))
                .chain(normal.iter().cloned())
                .collect::<Vec<_>>()
                .join(" "),
            order_only_suffix(&order_only)
        );
        let _ = writeln!(rule, "{}", target_line.trim_end());
        let _ = writeln!(rule, "\t@mkdir -p {}", display(&action.output_dir));

        let objs = objects.iter().map(|o| display(o)).collect::<Vec<_>>().join(" ");
        let link_flags = link_flags(action);
        match &action.kind {
            ComponentKind::StaticLibrary { .. } => {
                let _ = writeln!(rule, "\t$(AR) rcs {} {}", display(&file), objs);
            }
            ComponentKind::SharedLibrary { .. } => {
                let _ = writeln!(
                    rule,
                    "\t$(CC) -shared -o {} {} {}$(LDFLAGS)",
                    display(&file),
                    objs,
                    link_flags
                );
                let _ = writeln!(rule, "\t@mkdir -p {}", display(&self.lib_dir));
                let _ = writeln!(rule, "\tcp {} {}/", display(&file), display(&self.lib_dir));
            }
            ComponentKind::Program { .. } | ComponentKind::Test { .. } => {
                let _ = writeln!(
                    rule,
                    "\t$(CC) -o {} {} {}$(LDFLAGS)",
                    display(&file),
                    objs,
                    link_flags
                );
            }
            ComponentKind::Doc { command, .. } => {
                let _ = writeln!(
                    rule,
                    "\tcd {} && {}",
                    display(&action.source_dir),
                    escape(command)
                );
                let _ = writeln!(rule, "\t@touch {}", display(&file));
            }
            ComponentKind::Autotools { configure_args, .. } => {
                let args: String = configure_args
                    .iter()
                    .map(|a| format!(" {}", shell_word(a)))
                    .collect();
                let _ = writeln!(
                    rule,
                    "\tcd {} && ./configure --prefix={}{} && $(MAKE) && $(MAKE) install",
                    display(&action.source_dir),
                    display(&self.install_prefix),
                    args
                );
                let _ = writeln!(rule, "\t@touch {}", display(&file));
            }
            ComponentKind::HeaderOnly | ComponentKind::External { .. } => {}
        }

        if let ComponentKind::Test { args, .. } = &action.kind {
            let args: String = args.iter().map(|a| format!(" {}", shell_word(a))).collect();
            let _ = writeln!(
                rule,
                "\nrun-{}: {}\n\tcd {} && {}{}",
                action.target,
                display(&file),
                display(&action.source_dir),
                display(&file),
                args
            );
        }

        rule
    }

    fn render_objects(
        &self,
        rule: &mut String,
        action: &BuildAction,
        prereqs: &[String],
        pic: bool,
    ) -> Vec<PathBuf> {
        let includes: String = action
            .include_paths
            .iter()
            .map(|dir| format!(" -I{}", display(dir)))
            .collect();
        let pic_flag = if pic { " -fPIC" } else { "" };
        let object_dir = action.output_dir.join("obj");

        let mut objects = Vec::with_capacity(action.sources.len());
        for (index, source) in action.sources.iter().enumerate() {
            let file_name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "source".to_string());
            let object = object_dir.join(format!("{}-{}.o", index, file_name));
            let _ = writeln!(
                rule,
                "{}: {}{}\n\t@mkdir -p {}\n\t$(CC) $(CFLAGS){}{} -c {} -o {}\n",
                display(&object),
                display(source),
                order_only_suffix(prereqs),
                display(&object_dir),
                pic_flag,
                includes,
                display(source),
                display(&object)
            );
            objects.push(object);
        }
        objects
    }
}

impl<R: CommandRunner> BuildEngine for MakefileEngine<R> {
    fn register(&mut self, action: BuildAction) -> BuildResult<ActionHandle> {
        if self.outputs.contains_key(&action.target) {
            return Err(BuildError::engine(
                format!("target '{}' is already registered", action.target),
                None,
            ));
        }

        let rule = self.render_action(&action);
        self.phony.push(action.target.clone());
        if action.is_test() {
            self.phony.push(format!("run-{}", action.target));
        }
        self.outputs.insert(action.target.clone(), action.output_file());
        self.rules.push(rule);
        debug!(target = %action.target, kind = %action.kind, "registered make rule");
        Ok(ActionHandle(self.rules.len() - 1))
    }

    fn alias(&mut self, name: &str, members: &[String]) -> BuildResult<()> {
        if self.outputs.contains_key(name) {
            return Err(BuildError::engine(
                format!("alias '{}' clashes with a target of the same name", name),
                None,
            ));
        }
        self.phony.push(name.to_string());
        self.outputs.insert(name.to_string(), None);
        let rule = if members.is_empty() {
            format!("{}:\n", name)
        } else {
            format!("{}: {}\n", name, members.join(" "))
        };
        self.rules.push(rule);
        Ok(())
    }

    fn execute(&mut self, targets: &[String]) -> BuildResult<()> {
        let makefile = self.write()?;
        let command = ShellCommand::new(self.program.as_str())
            .arg("-f")
            .path_arg(&makefile)
            .arg(format!("-j{}", self.jobs))
            .args(targets.iter().cloned())
            .current_dir(&self.build_dir);

        info!(command = %command, "running build engine");
        let output = self.runner.run(&command).map_err(|e| {
            let exit_code = e.exit_code();
            BuildError::engine(e.to_string(), exit_code)
        })?;

        if !output.success() {
            let code = output.exit_code;
            let detail = last_line(&output.stderr);
            self.last_output = Some(output);
            return Err(BuildError::engine(
                format!("`{}` exited with code {}{}", command, code, detail),
                Some(code),
            ));
        }
        self.last_output = Some(output);
        Ok(())
    }
}

fn link_flags(action: &BuildAction) -> String {
    let mut flags = String::new();
    for dir in &action.library_paths {
        let _ = write!(flags, "-L{} ", display(dir));
    }
    for lib in &action.libraries {
        let _ = write!(flags, "-l{} ", lib);
    }
    flags
}

fn order_only_suffix(prereqs: &[String]) -> String {
    if prereqs.is_empty() {
        String::new()
    } else {
        format!(" | {}", prereqs.join(" "))
    }
}

fn last_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(|line| format!(": {}", line.trim()))
        .unwrap_or_default()
}

fn display(path: &Path) -> String {
    escape(&path.display().to_string())
}

/// Make treats `$` specially
fn escape(text: &str) -> String {
    text.replace('$', "$$")
}

fn shell_word(word: &str) -> String {
    if !word.is_empty() && word.chars().all(|c| c.is_ascii_alphanumeric() || "-_=./:,+@%".contains(c)) {
        escape(word)
    } else {
        format!("'{}'", escape(&word.replace('\'', r"'\''")))
    }
}
