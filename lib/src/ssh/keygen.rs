use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use devsetup_utils::PathQuotedDisplay;
use indoc::printdoc;

use super::{client_config, AccessError, SshPaths};
use crate::provision::Session;
use crate::runner::{CommandRunner, Invocation};
use crate::store::{ConfigStore, StoreKey};

/// The public half of the key pair at `key`.
pub(crate) fn public_key_path(key: &Utf8Path) -> Utf8PathBuf {
    let mut p = key.as_str().to_owned();
    p.push_str(".pub");
    p.into()
}

/// The email to offer as the key comment: Git's `user.email` if set,
/// otherwise `fallback`.
pub(crate) fn default_email(store: &mut dyn ConfigStore, fallback: &str) -> Result<String> {
    let configured = store
        .read(&StoreKey::git("user.email"))?
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty());
    Ok(configured.unwrap_or_else(|| fallback.to_owned()))
}

/// Generate a passphrase-less Ed25519 key pair at `key`. The pair is
/// created in a scratch directory beside `key` and moved into place only
/// once both halves exist, so a failure leaves any existing pair intact.
pub(crate) fn generate(runner: &mut dyn CommandRunner, key: &Utf8Path, email: &str) -> Result<()> {
    let dir = key
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."));
    std::fs::create_dir_all(dir).with_context(|| format!("Creating {dir}"))?;
    let scratch = tempfile::Builder::new()
        .prefix(".devsetup-keygen")
        .tempdir_in(dir)
        .with_context(|| format!("Creating temporary directory in {dir}"))?;
    let scratch_key = Utf8Path::from_path(scratch.path())
        .with_context(|| format!("{} is not UTF-8", scratch.path().display()))?
        .join("key");
    let scratch_pub = public_key_path(&scratch_key);

    let inv = Invocation::new("ssh-keygen").args([
        "-q",
        "-t",
        "ed25519",
        "-N",
        "",
        "-C",
        email,
        "-f",
        scratch_key.as_str(),
    ]);
    let o = runner.run(&inv)?;
    if !o.success || !scratch_key.try_exists()? || !scratch_pub.try_exists()? {
        return Err(AccessError::KeyGeneration {
            path: key.to_owned(),
            output: o.output.trim().to_owned(),
        }
        .into());
    }
    let pubkey = public_key_path(key);
    std::fs::rename(&scratch_pub, &pubkey).with_context(|| format!("Moving new key to {pubkey}"))?;
    std::fs::rename(&scratch_key, key).with_context(|| format!("Moving new key to {key}"))?;
    Ok(())
}

/// Recreate a missing `.pub` file from the private key at `key`.
fn restore_public_key(runner: &mut dyn CommandRunner, key: &Utf8Path) -> Result<()> {
    let pubkey = public_key_path(key);
    let o = runner.run(&Invocation::new("ssh-keygen").args(["-y", "-f", key.as_str()]))?;
    if !o.success {
        return Err(AccessError::KeyGeneration {
            path: pubkey,
            output: o.output.trim().to_owned(),
        }
        .into());
    }
    let line = o.output.trim();
    openssh_keys::PublicKey::parse(line)
        .with_context(|| format!("Parsing public key derived from {key}"))?;
    std::fs::write(&pubkey, format!("{line}\n")).with_context(|| format!("Writing {pubkey}"))?;
    println!("Recreated {pubkey} from {key}");
    Ok(())
}

/// Read and validate the public key, returning it with its fingerprint.
fn read_public_key(key: &Utf8Path) -> Result<(String, String)> {
    let path = public_key_path(key);
    let contents =
        std::fs::read_to_string(&path).with_context(|| format!("Reading {path}"))?;
    let contents = contents.trim().to_owned();
    let parsed = openssh_keys::PublicKey::parse(&contents)
        .with_context(|| format!("Parsing {path}"))?;
    let fingerprint = format!("SHA256:{} ({})", parsed.fingerprint(), parsed.keytype());
    Ok((contents, fingerprint))
}

/// Obtain a key the operator can register, point the SSH config at it and
/// wait while they add it to their account.
pub(crate) fn remediate(s: &mut Session, paths: &SshPaths) -> Result<()> {
    let email = default_email(s.store, &s.config.fallback_email)?;
    let email = s.prompt.ask_text("Email address for the key", &email)?;
    let key = s
        .prompt
        .ask_text("Save the key to", &s.config.default_key_path)?;
    // ssh resolves a relative IdentityFile against its own working directory
    let key = crate::utils::absolutize(&crate::utils::expand_tilde(key.trim(), &s.home))?;

    let reuse = key.try_exists()?
        && !s.prompt.ask_yes_no(
            &format!("A key already exists at {key}. Overwrite it?"),
            false,
        )?;
    if reuse {
        if !public_key_path(&key).try_exists()? {
            restore_public_key(s.runner, &key)?;
        }
        println!("Using the existing key at {key}");
    } else {
        generate(s.runner, &key, &email)?;
        println!("Generated a new key at {key}");
    }

    let (pubkey, fingerprint) = read_public_key(&key)?;
    client_config::update(&paths.config, &s.config.git_host, &key, s.platform)?;

    printdoc! {"

        Add this public key to your account at {url}

        {pubkey}

        Fingerprint: {fingerprint}
        (it is also in {path})

        ",
        url = s.config.key_settings_url,
        pubkey = pubkey,
        fingerprint = fingerprint,
        path = PathQuotedDisplay::new(&public_key_path(&key)),
    };
    s.prompt
        .pause("Press Enter once the key has been added")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{
        failure, success, Answer, Fixture, MemoryStore, ScriptedRunner, GITHUB_HOST_KEY,
    };

    #[test]
    fn test_default_email() -> Result<()> {
        let mut store = MemoryStore::default();
        assert_eq!(
            default_email(&mut store, "developer@example-org.com")?,
            "developer@example-org.com"
        );
        store.set(&StoreKey::git("user.email"), "  ");
        assert_eq!(
            default_email(&mut store, "developer@example-org.com")?,
            "developer@example-org.com"
        );
        store.set(&StoreKey::git("user.email"), "jo@example.com");
        assert_eq!(
            default_email(&mut store, "developer@example-org.com")?,
            "jo@example.com"
        );
        Ok(())
    }

    #[test]
    fn test_public_key_path() {
        assert_eq!(
            public_key_path(Utf8Path::new("/h/.ssh/id_ed25519")),
            Utf8Path::new("/h/.ssh/id_ed25519.pub")
        );
    }

    #[test]
    fn test_generate_failure_leaves_nothing() -> Result<()> {
        let td = tempfile::tempdir()?;
        let key = Utf8Path::from_path(td.path()).unwrap().join("keys/id_ed25519");
        let mut runner = ScriptedRunner::default();
        runner.respond(
            "ssh-keygen",
            failure("Saving key failed: Permission denied\n"),
        );
        let e = generate(&mut runner, &key, "jo@example.com").unwrap_err();
        match e.downcast_ref::<AccessError>() {
            Some(AccessError::KeyGeneration { path, output }) => {
                assert_eq!(path, &key);
                assert!(output.contains("Saving key failed"));
            }
            o => panic!("unexpected error {o:?}"),
        }
        // Not even the scratch directory is left behind
        assert_eq!(std::fs::read_dir(td.path().join("keys"))?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_generate() -> Result<()> {
        let td = tempfile::tempdir()?;
        let key = Utf8Path::from_path(td.path()).unwrap().join("id_ed25519");
        let mut runner = ScriptedRunner::default();
        runner.respond("ssh-keygen", success(""));
        generate(&mut runner, &key, "jo@example.com")?;
        assert!(key.exists());
        let (pubkey, fingerprint) = read_public_key(&key)?;
        assert!(pubkey.starts_with("ssh-ed25519 "));
        assert!(fingerprint.starts_with("SHA256:"));
        let inv = runner.find("ssh-keygen").unwrap();
        assert!(inv
            .to_string()
            .starts_with("ssh-keygen -q -t ed25519 -N '' -C jo@example.com -f "));
        let mut entries: Vec<_> = std::fs::read_dir(td.path())?
            .map(|e| e.map(|e| e.file_name()))
            .collect::<std::io::Result<_>>()?;
        entries.sort();
        assert_eq!(entries, ["id_ed25519", "id_ed25519.pub"]);
        Ok(())
    }

    /// An existing key pair at the default location.
    fn existing_pair(f: &Fixture) -> Utf8PathBuf {
        let key = f.home.join(".ssh/id_ed25519");
        std::fs::create_dir_all(f.home.join(".ssh")).unwrap();
        std::fs::write(&key, "OLD PRIVATE KEY\n").unwrap();
        std::fs::write(public_key_path(&key), format!("{}\n", public_half())).unwrap();
        key
    }

    fn public_half() -> &'static str {
        GITHUB_HOST_KEY.split_once(' ').unwrap().1
    }

    #[test]
    fn test_remediate_reuses_existing_key() -> Result<()> {
        let mut f = Fixture::new()?;
        let key = existing_pair(&f);
        f.prompt.answer(Answer::Default);
        f.prompt.answer(Answer::Default);
        // Overwrite defaults to no
        f.prompt.answer(Answer::Default);
        f.prompt.answer(Answer::Enter);
        let paths = SshPaths::new(&f.home);
        remediate(&mut f.session(), &paths)?;
        f.prompt.assert_done();
        assert_eq!(f.runner.count("ssh-keygen"), 0);
        assert_eq!(std::fs::read_to_string(&key)?, "OLD PRIVATE KEY\n");
        let config = std::fs::read_to_string(f.home.join(".ssh/config"))?;
        assert!(config.contains(&format!("IdentityFile {key}")));
        Ok(())
    }

    #[test]
    fn test_remediate_overwrites_existing_key() -> Result<()> {
        let mut f = Fixture::new()?;
        let key = existing_pair(&f);
        f.prompt.answer(Answer::Default);
        f.prompt.answer(Answer::Default);
        f.prompt.answer(Answer::YesNo(true));
        f.prompt.answer(Answer::Enter);
        f.runner.respond("ssh-keygen -q", success(""));
        let paths = SshPaths::new(&f.home);
        remediate(&mut f.session(), &paths)?;
        f.prompt.assert_done();
        assert_eq!(f.runner.count("ssh-keygen"), 1);
        assert_eq!(std::fs::read_to_string(&key)?, "PRIVATE KEY\n");
        assert!(f.home.join(".ssh/config").exists());
        Ok(())
    }

    #[test]
    fn test_failed_overwrite_keeps_existing_key() -> Result<()> {
        let mut f = Fixture::new()?;
        let key = existing_pair(&f);
        f.prompt.answer(Answer::Default);
        f.prompt.answer(Answer::Default);
        f.prompt.answer(Answer::YesNo(true));
        f.runner
            .respond("ssh-keygen -q", failure("Saving key failed: disk full\n"));
        let paths = SshPaths::new(&f.home);
        let e = remediate(&mut f.session(), &paths).unwrap_err();
        assert!(matches!(
            e.downcast_ref::<AccessError>(),
            Some(AccessError::KeyGeneration { .. })
        ));
        assert_eq!(std::fs::read_to_string(&key)?, "OLD PRIVATE KEY\n");
        assert_eq!(
            std::fs::read_to_string(public_key_path(&key))?.trim(),
            public_half()
        );
        assert!(!f.home.join(".ssh/config").exists());
        f.prompt.assert_done();
        Ok(())
    }

    #[test]
    fn test_reuse_restores_missing_public_key() -> Result<()> {
        let mut f = Fixture::new()?;
        let key = existing_pair(&f);
        std::fs::remove_file(public_key_path(&key))?;
        f.prompt.answer(Answer::Default);
        f.prompt.answer(Answer::Default);
        f.prompt.answer(Answer::Default);
        f.prompt.answer(Answer::Enter);
        f.runner
            .respond("ssh-keygen -y", success(&format!("{}\n", public_half())));
        let paths = SshPaths::new(&f.home);
        remediate(&mut f.session(), &paths)?;
        assert_eq!(
            std::fs::read_to_string(public_key_path(&key))?.trim(),
            public_half()
        );
        assert_eq!(f.runner.count("ssh-keygen -q"), 0);
        f.prompt.assert_done();
        Ok(())
    }

    #[test]
    fn test_unreadable_key_leaves_config_alone() -> Result<()> {
        let mut f = Fixture::new()?;
        let key = existing_pair(&f);
        std::fs::remove_file(public_key_path(&key))?;
        f.prompt.answer(Answer::Default);
        f.prompt.answer(Answer::Default);
        f.prompt.answer(Answer::Default);
        f.runner.respond(
            "ssh-keygen -y",
            failure("Load key: incorrect passphrase supplied\n"),
        );
        let paths = SshPaths::new(&f.home);
        assert!(remediate(&mut f.session(), &paths).is_err());
        assert!(!f.home.join(".ssh/config").exists());
        assert!(!public_key_path(&key).exists());
        f.prompt.assert_done();
        Ok(())
    }
}
