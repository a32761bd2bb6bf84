//! SFTP-backed VFS connection
//!
//! Uses the SSH2 protocol. The session is opened lazily on first use and
//! reopened after [`VfsBackend::disconnect`].

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{VfsBackend, VfsStat};
use crate::config::SavedConnection;
use crate::providers::{ProviderError, ProviderResult, join_slash};

/// Connection information for an SFTP server
#[derive(Debug, Clone)]
pub struct SftpConnectionInfo {
    pub user: String,
    /// Hostname or IP address
    pub host: String,
    /// Port (default 22)
    pub port: u16,
    /// Remote directory exposed as the connection root
    pub root: String,
    pub auth: SftpAuth,
}

/// Authentication method for SFTP
#[derive(Debug, Clone)]
pub enum SftpAuth {
    Password(String),
    Key {
        /// Path to private key file
        private_key: PathBuf,
        /// Passphrase for key (if encrypted)
        passphrase: Option<String>,
    },
    Agent,
}

impl SftpConnectionInfo {
    /// Key auth when the saved connection names a key file, agent auth otherwise
    pub fn from_saved(saved: &SavedConnection) -> Self {
        let auth = match &saved.key_file {
            Some(key) => SftpAuth::Key { private_key: key.clone(), passphrase: None },
            None => SftpAuth::Agent,
        };
        Self {
            user: saved.user.clone(),
            host: saved.host.clone(),
            port: saved.port,
            root: saved.root.clone(),
            auth,
        }
    }

    /// Parse `sftp://user@host:port/root`; auth defaults to the SSH agent
    pub fn from_uri(uri: &str) -> Option<Self> {
        let uri = uri.strip_prefix("sftp://")?;

        let (user_host, root) = match uri.find('/') {
            Some(idx) => (&uri[..idx], &uri[idx..]),
            None => (uri, "/"),
        };

        let (user, host_port) = user_host.split_once('@')?;

        let (host, port) = match host_port.split_once(':') {
            Some((h, p)) => (h.to_string(), p.parse().ok()?),
            None => (host_port.to_string(), 22),
        };

        Some(Self {
            user: user.to_string(),
            host,
            port,
            root: root.to_string(),
            auth: SftpAuth::Agent,
        })
    }

    /// Get display name for this connection
    pub fn display_name(&self) -> String {
        if self.port != 22 {
            format!("{}@{}:{}", self.user, self.host, self.port)
        } else {
            format!("{}@{}", self.user, self.host)
        }
    }

    /// Map a `/`-rooted connection path onto the remote filesystem
    fn remote_path(&self, path: &str) -> PathBuf {
        let root = if self.root.is_empty() { "/" } else { self.root.as_str() };
        let rel = path.trim_start_matches('/');
        if rel.is_empty() {
            PathBuf::from(root)
        } else {
            PathBuf::from(join_slash(root, rel))
        }
    }
}

struct Connected {
    session: ssh2::Session,
    sftp: ssh2::Sftp,
}

/// VFS backend over an SSH2 SFTP session
pub struct SftpBackend {
    connection: SftpConnectionInfo,
    state: Mutex<Option<Connected>>,
}

impl std::fmt::Debug for SftpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SftpBackend").field("connection", &self.connection.display_name()).finish()
    }
}

impl SftpBackend {
    pub fn new(connection: SftpConnectionInfo) -> Self {
        Self { connection, state: Mutex::new(None) }
    }

    /// Convert ssh2 error to provider error
    fn map_ssh_error(e: ssh2::Error, path: &Path) -> ProviderError {
        match e.code() {
            ssh2::ErrorCode::Session(_) => ProviderError::Connection(e.to_string()),
            // LIBSSH2_FX_NO_SUCH_FILE
            ssh2::ErrorCode::SFTP(2) => ProviderError::NotFound(path.to_string_lossy().into_owned()),
            // LIBSSH2_FX_PERMISSION_DENIED
            ssh2::ErrorCode::SFTP(3) => ProviderError::PermissionDenied(path.to_string_lossy().into_owned()),
            _ => ProviderError::Other(e.to_string()),
        }
    }

    fn connect(&self) -> ProviderResult<Connected> {
        let conn = &self.connection;
        let addr = format!("{}:{}", conn.host, conn.port);
        info!(connection = %conn.display_name(), "opening sftp session");

        let tcp = TcpStream::connect(&addr)
            .map_err(|e| ProviderError::Connection(format!("Failed to connect to {}: {}", addr, e)))?;

        let mut session = ssh2::Session::new()
            .map_err(|e| ProviderError::Connection(format!("Failed to create session: {}", e)))?;

        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| ProviderError::Connection(format!("SSH handshake failed: {}", e)))?;

        session.set_keepalive(true, 10);

        match &conn.auth {
            SftpAuth::Password(password) => {
                session
                    .userauth_password(&conn.user, password)
                    .map_err(|e| ProviderError::Auth(format!("Password auth failed: {}", e)))?;
            }
            SftpAuth::Key { private_key, passphrase } => {
                session
                    .userauth_pubkey_file(&conn.user, None, private_key, passphrase.as_deref())
                    .map_err(|e| ProviderError::Auth(format!("Key auth failed: {}", e)))?;
            }
            SftpAuth::Agent => {
                let mut agent = session
                    .agent()
                    .map_err(|e| ProviderError::Auth(format!("Failed to connect to SSH agent: {}", e)))?;
                agent
                    .connect()
                    .map_err(|e| ProviderError::Auth(format!("Failed to connect to SSH agent: {}", e)))?;
                agent
                    .list_identities()
                    .map_err(|e| ProviderError::Auth(format!("Failed to list agent identities: {}", e)))?;

                let authenticated = agent
                    .identities()
                    .unwrap_or_default()
                    .iter()
                    .any(|identity| agent.userauth(&conn.user, identity).is_ok());
                if !authenticated {
                    return Err(ProviderError::Auth("No valid identity found in SSH agent".to_string()));
                }
            }
        }

        if !session.authenticated() {
            return Err(ProviderError::Auth("Authentication failed".to_string()));
        }

        let sftp = session
            .sftp()
            .map_err(|e| ProviderError::Connection(format!("Failed to open SFTP: {}", e)))?;

        Ok(Connected { session, sftp })
    }

    /// Run `f` against the SFTP handle, connecting if necessary
    fn with_sftp<T>(&self, f: impl FnOnce(&ssh2::Sftp) -> ProviderResult<T>) -> ProviderResult<T> {
        let mut state = self.state.lock();
        if state.is_none() {
            *state = Some(self.connect()?);
        }
        match state.as_ref() {
            Some(connected) => f(&connected.sftp),
            None => Err(ProviderError::Connection("SFTP session not available".to_string())),
        }
    }

    fn to_stat(path: String, stat: &ssh2::FileStat) -> VfsStat {
        let is_dir = stat.is_dir();
        VfsStat {
            path,
            is_dir,
            size: if is_dir { None } else { stat.size },
            modified: stat.mtime.map(|t| UNIX_EPOCH + Duration::from_secs(t)),
        }
    }

    fn remove_remote(sftp: &ssh2::Sftp, remote: &Path) -> ProviderResult<()> {
        let stat = sftp.stat(remote).map_err(|e| Self::map_ssh_error(e, remote))?;
        if !stat.is_dir() {
            return sftp.unlink(remote).map_err(|e| Self::map_ssh_error(e, remote));
        }
        for (child, child_stat) in sftp.readdir(remote).map_err(|e| Self::map_ssh_error(e, remote))? {
            if is_dot_entry(&child) {
                continue;
            }
            if child_stat.is_dir() {
                Self::remove_remote(sftp, &child)?;
            } else {
                sftp.unlink(&child).map_err(|e| Self::map_ssh_error(e, &child))?;
            }
        }
        sftp.rmdir(remote).map_err(|e| Self::map_ssh_error(e, remote))
    }
}

fn is_dot_entry(path: &Path) -> bool {
    match path.file_name() {
        Some(name) => {
            let name = name.to_string_lossy();
            name.is_empty() || name == "." || name == ".."
        }
        None => true,
    }
}

impl VfsBackend for SftpBackend {
    fn list(&self, path: &str) -> ProviderResult<Vec<VfsStat>> {
        let remote = self.connection.remote_path(path);
        debug!(remote = %remote.display(), "sftp readdir");
        self.with_sftp(|sftp| {
            let entries = sftp.readdir(&remote).map_err(|e| Self::map_ssh_error(e, &remote))?;
            Ok(entries
                .into_iter()
                .filter(|(p, _)| !is_dot_entry(p))
                .filter_map(|(p, stat)| {
                    let name = p.file_name()?.to_string_lossy().into_owned();
                    Some(Self::to_stat(join_slash(path, &name), &stat))
                })
                .collect())
        })
    }

    fn stat(&self, path: &str) -> ProviderResult<Option<VfsStat>> {
        let remote = self.connection.remote_path(path);
        self.with_sftp(|sftp| match sftp.stat(&remote) {
            Ok(stat) => Ok(Some(Self::to_stat(path.to_string(), &stat))),
            Err(e) => match Self::map_ssh_error(e, &remote) {
                ProviderError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        })
    }

    fn mkdir(&self, path: &str) -> ProviderResult<()> {
        let remote = self.connection.remote_path(path);
        self.with_sftp(|sftp| sftp.mkdir(&remote, 0o755).map_err(|e| Self::map_ssh_error(e, &remote)))
    }

    fn remove(&self, path: &str) -> ProviderResult<()> {
        let remote = self.connection.remote_path(path);
        self.with_sftp(|sftp| Self::remove_remote(sftp, &remote))
    }

    fn read(&self, path: &str) -> ProviderResult<Vec<u8>> {
        let remote = self.connection.remote_path(path);
        self.with_sftp(|sftp| {
            let mut file = sftp.open(&remote).map_err(|e| Self::map_ssh_error(e, &remote))?;
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            Ok(contents)
        })
    }

    fn write(&self, path: &str, data: &[u8]) -> ProviderResult<()> {
        let remote = self.connection.remote_path(path);
        self.with_sftp(|sftp| {
            let mut file = sftp.create(&remote).map_err(|e| Self::map_ssh_error(e, &remote))?;
            file.write_all(data)?;
            Ok(())
        })
    }

    fn rename(&self, from: &str, to: &str) -> ProviderResult<()> {
        let src = self.connection.remote_path(from);
        let dst = self.connection.remote_path(to);
        self.with_sftp(|sftp| sftp.rename(&src, &dst, None).map_err(|e| Self::map_ssh_error(e, &src)))
    }

    fn disconnect(&self) {
        if let Some(connected) = self.state.lock().take() {
            debug!(connection = %self.connection.display_name(), "closing sftp session");
            let _ = connected.session.disconnect(None, "Goodbye", None);
        }
    }
}

impl Drop for SftpBackend {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_uri() {
        let info = SftpConnectionInfo::from_uri("sftp://deploy@files.example.com:2222/srv/data").unwrap();
        assert_eq!(info.user, "deploy");
        assert_eq!(info.host, "files.example.com");
        assert_eq!(info.port, 2222);
        assert_eq!(info.root, "/srv/data");
        assert_eq!(info.display_name(), "deploy@files.example.com:2222");

        let default_port = SftpConnectionInfo::from_uri("sftp://me@host").unwrap();
        assert_eq!(default_port.port, 22);
        assert_eq!(default_port.root, "/");
        assert!(SftpConnectionInfo::from_uri("sftp://host-without-user").is_none());
    }

    #[test]
    fn test_remote_path_is_below_root() {
        let info = SftpConnectionInfo::from_uri("sftp://me@host/srv/data").unwrap();
        assert_eq!(info.remote_path("/"), PathBuf::from("/srv/data"));
        assert_eq!(info.remote_path("/in/a.csv"), PathBuf::from("/srv/data/in/a.csv"));
    }
}
