//! `init`: lay out a new contract project from embedded templates.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::BuildError;
use crate::util::template::render;

struct TemplateFile {
    name: &'static str,
    contents: &'static str,
    executable: bool,
}

const FILES: &[TemplateFile] = &[
    TemplateFile {
        name: "Cargo.toml",
        contents: include_str!("../templates/init/_Cargo.toml"),
        executable: false,
    },
    TemplateFile {
        name: ".gitignore",
        contents: include_str!("../templates/init/_gitignore"),
        executable: false,
    },
    TemplateFile {
        name: "build.sh",
        contents: include_str!("../templates/init/build.sh"),
        executable: true,
    },
    TemplateFile {
        name: "lib.rs",
        contents: include_str!("../templates/init/lib.rs"),
        executable: false,
    },
    TemplateFile {
        name: "test.sh",
        contents: include_str!("../templates/init/test.sh"),
        executable: true,
    },
];

/// Names usable both as a directory and as a cargo package name.
fn check_name(name: &str) -> Result<(), BuildError> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit() || c == '-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(BuildError::Precondition(format!(
            "invalid project name {name:?}: use letters, digits, '_' or '-'"
        )))
    }
}

/// Create `<parent>/<name>` and fill it with the project templates.
///
/// Fails if the directory already exists; nothing is overwritten.
pub fn init_project(parent: &Path, name: &str) -> Result<PathBuf, BuildError> {
    check_name(name)?;
    let root = parent.join(name);

    fs::create_dir(&root).map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => {
            BuildError::Precondition(format!("{} already exists", root.display()))
        }
        _ => BuildError::Precondition(format!("cannot create {}: {e}", root.display())),
    })?;

    for file in FILES {
        let path = root.join(file.name);
        let contents = render(file.contents, &[("name", name)]);
        write_file(&path, &contents, file.executable).map_err(|e| {
            BuildError::Precondition(format!("cannot write {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "scaffolded");
    }

    Ok(root)
}

fn write_file(path: &Path, contents: &str, executable: bool) -> io::Result<()> {
    fs::write(path, contents)?;
    if executable {
        set_executable(path)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
