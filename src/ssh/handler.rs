//! SSH 客户端会话处理器

use async_trait::async_trait;
use russh::client;
use russh_keys::key::PublicKey;
use russh_keys::PublicKeyBase64;
use sha2::Digest;
use tracing::debug;

/// 不校验主机密钥的客户端处理器
///
/// 接受任何远端身份，只记录密钥指纹以便审计
pub struct ClientHandler {
    target: String,
}

impl ClientHandler {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            target: format!("{}:{}", host, port),
        }
    }
}

/// 主机公钥的 SHA-256 指纹（十六进制）
pub fn fingerprint(key_base64: &str) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(key_base64.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            host = %self.target,
            fingerprint = %fingerprint(&server_public_key.public_key_base64()),
            "Accepting host key without verification"
        );
        Ok(true)
    }
}
