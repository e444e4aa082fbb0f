//! Scripted stand-ins for the runner, the operator and the global
//! configuration, plus a scratch home directory.

use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};

use crate::config::Config;
use crate::interaction::Interaction;
use crate::platform::Platform;
use crate::provision::Session;
use crate::runner::{CommandOutput, CommandRunner, Invocation};
use crate::store::{ConfigStore, StoreKey};

/// GitHub's published Ed25519 host key.
pub(crate) const GITHUB_HOST_KEY: &str =
    "github.com ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl";

/// Written by the scripted `ssh-keygen`.
const GENERATED_PUBLIC_KEY: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl";

pub(crate) fn success(output: &str) -> CommandOutput {
    CommandOutput {
        success: true,
        code: Some(0),
        output: output.into(),
    }
}

pub(crate) fn failure(output: &str) -> CommandOutput {
    CommandOutput {
        success: false,
        code: Some(1),
        output: output.into(),
    }
}

/// Answers commands from a script keyed by command line prefix, and panics
/// on anything unscripted.
#[derive(Debug, Default)]
pub(crate) struct ScriptedRunner {
    responses: Vec<(String, VecDeque<(CommandOutput, Vec<String>)>)>,
    executables: HashSet<String>,
    pub(crate) invocations: Vec<Invocation>,
    pub(crate) activated: Vec<Utf8PathBuf>,
}

impl ScriptedRunner {
    /// Queue `output` for the next command whose command line starts with `prefix`.
    pub(crate) fn respond(&mut self, prefix: &str, output: CommandOutput) {
        self.respond_installing(prefix, output, &[])
    }

    /// Like [`Self::respond`], and once that response is used, `which`
    /// finds `executables`.
    pub(crate) fn respond_installing(
        &mut self,
        prefix: &str,
        output: CommandOutput,
        executables: &[&str],
    ) {
        let entry = (output, executables.iter().map(|e| e.to_string()).collect());
        match self.responses.iter_mut().find(|(p, _)| p == prefix) {
            Some((_, q)) => q.push_back(entry),
            None => self
                .responses
                .push((prefix.to_owned(), VecDeque::from([entry]))),
        }
    }

    /// Make `which(name)` succeed. `name` may be a bare name or an absolute path.
    pub(crate) fn install(&mut self, name: &str) {
        self.executables.insert(name.to_owned());
    }

    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.invocations
            .iter()
            .filter(|i| i.argv().join(" ").starts_with(prefix))
            .count()
    }

    pub(crate) fn find(&self, prefix: &str) -> Option<&Invocation> {
        self.invocations
            .iter()
            .find(|i| i.argv().join(" ").starts_with(prefix))
    }

    /// Emulate ssh-keygen writing a key pair.
    fn write_keypair(invocation: &Invocation) {
        let Some(pos) = invocation.args.iter().position(|a| a == "-f") else {
            return;
        };
        let key = &invocation.args[pos + 1];
        std::fs::write(key, "PRIVATE KEY\n").unwrap();
        std::fs::write(format!("{key}.pub"), format!("{GENERATED_PUBLIC_KEY} test\n")).unwrap();
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<CommandOutput> {
        let cmdline = invocation.argv().join(" ");
        let (o, executables) = self
            .responses
            .iter_mut()
            .filter(|(p, q)| cmdline.starts_with(p.as_str()) && !q.is_empty())
            .max_by_key(|(p, _)| p.len())
            .and_then(|(_, q)| q.pop_front())
            .unwrap_or_else(|| panic!("unscripted command: {cmdline}"));
        if o.success && invocation.program == "ssh-keygen" && invocation.args.contains(&"-t".into()) {
            Self::write_keypair(invocation);
        }
        self.executables.extend(executables);
        self.invocations.push(invocation.clone());
        Ok(o)
    }

    fn which(&self, name: &str) -> Option<Utf8PathBuf> {
        if !self.executables.contains(name) {
            return None;
        }
        if name.starts_with('/') {
            Some(name.into())
        } else {
            Some(Utf8Path::new("/usr/bin").join(name))
        }
    }

    fn activate(&mut self, bin_dir: &Utf8Path) -> Result<()> {
        self.activated.push(bin_dir.to_owned());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Answer {
    YesNo(bool),
    Text(String),
    /// Empty input to a text prompt.
    Default,
    /// Acknowledge a pause.
    Enter,
}

/// Replays answers in order and panics on any question not scripted.
#[derive(Debug, Default)]
pub(crate) struct ScriptedPrompt {
    answers: VecDeque<Answer>,
    pub(crate) asked: Vec<String>,
}

impl ScriptedPrompt {
    pub(crate) fn answer(&mut self, a: Answer) {
        self.answers.push_back(a);
    }

    #[track_caller]
    pub(crate) fn assert_done(&self) {
        assert!(
            self.answers.is_empty(),
            "unused answers {:?}; asked {:?}",
            self.answers,
            self.asked
        );
    }

    fn next(&mut self, question: &str) -> Answer {
        self.asked.push(question.to_owned());
        self.answers
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected question: {question}"))
    }
}

impl Interaction for ScriptedPrompt {
    fn ask_yes_no(&mut self, question: &str, default: bool) -> Result<bool> {
        match self.next(question) {
            Answer::YesNo(v) => Ok(v),
            Answer::Default => Ok(default),
            a => panic!("expected yes/no answer to {question:?}, have {a:?}"),
        }
    }

    fn ask_text(&mut self, prompt: &str, default: &str) -> Result<String> {
        match self.next(prompt) {
            Answer::Text(v) => Ok(v),
            Answer::Default => Ok(default.to_owned()),
            a => panic!("expected text answer to {prompt:?}, have {a:?}"),
        }
    }

    fn pause(&mut self, message: &str) -> Result<()> {
        match self.next(message) {
            Answer::Enter => Ok(()),
            a => panic!("expected Enter for {message:?}, have {a:?}"),
        }
    }
}

/// An in-memory [`ConfigStore`] that records writes.
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    values: HashMap<StoreKey, String>,
    pub(crate) writes: Vec<(StoreKey, String)>,
}

impl MemoryStore {
    /// Seed a value without recording it as a write.
    pub(crate) fn set(&mut self, key: &StoreKey, value: &str) {
        self.values.insert(key.clone(), value.to_owned());
    }
}

impl ConfigStore for MemoryStore {
    fn read(&mut self, key: &StoreKey) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn write(&mut self, key: &StoreKey, value: &str) -> Result<()> {
        self.writes.push((key.clone(), value.to_owned()));
        match key {
            StoreKey::ShellProfile => {
                let v = self.values.entry(key.clone()).or_default();
                v.push_str(value);
                v.push('\n');
            }
            _ => {
                self.values.insert(key.clone(), value.to_owned());
            }
        }
        Ok(())
    }
}

/// Everything a [`Session`] needs, owned, on top of a scratch home directory.
#[derive(Debug)]
pub(crate) struct Fixture {
    _tempdir: tempfile::TempDir,
    pub(crate) home: Utf8PathBuf,
    pub(crate) config: Config,
    pub(crate) platform: Platform,
    pub(crate) runner: ScriptedRunner,
    pub(crate) prompt: ScriptedPrompt,
    pub(crate) store: MemoryStore,
}

impl Fixture {
    pub(crate) fn new() -> Result<Self> {
        let tempdir = tempfile::tempdir()?;
        let home = Utf8Path::from_path(tempdir.path())
            .ok_or_else(|| anyhow::anyhow!("non-UTF-8 tempdir"))?
            .to_owned();
        Ok(Self {
            _tempdir: tempdir,
            home,
            config: Config::default(),
            platform: Platform::Linux,
            runner: ScriptedRunner::default(),
            prompt: ScriptedPrompt::default(),
            store: MemoryStore::default(),
        })
    }

    /// Pretend an earlier run already trusted the Git host.
    pub(crate) fn with_known_host(&mut self) {
        let dir = self.home.join(".ssh");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("known_hosts"), format!("{GITHUB_HOST_KEY}\n")).unwrap();
    }

    pub(crate) fn session(&mut self) -> Session<'_> {
        Session {
            config: &self.config,
            platform: self.platform,
            home: self.home.clone(),
            runner: &mut self.runner,
            prompt: &mut self.prompt,
            store: &mut self.store,
        }
    }
}
