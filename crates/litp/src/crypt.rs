/*
 * SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: Apache-2.0
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

// src/crypt.rs
// Reads passwords kept in the model engine's encrypted password store.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256, Block};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::errors::{LitpError, LitpResult};

pub const SECURITY_CONF: &str = "/etc/litp_security.conf";

const IV: [u8; 16] = *b"0000000000000000";
const END_OF_TEXT: char = '\u{3}';

/// Looks up the password stored for a user under a service key.
pub trait PasswordStore: Send + Sync + Debug {
    fn password(&self, key: &str, username: &str) -> LitpResult<String>;
}

type Ini = BTreeMap<String, BTreeMap<String, String>>;

fn parse_ini(text: &str) -> Ini {
    let mut sections = Ini::new();
    let mut current = String::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            current = name.trim().to_string();
            sections.entry(current.clone()).or_default();
            continue;
        }
        if let Some((k, v)) = line.split_once('=').or_else(|| line.split_once(':')) {
            sections
                .entry(current.clone())
                .or_default()
                .insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    sections
}

fn read(path: &Path) -> LitpResult<String> {
    std::fs::read_to_string(path).map_err(|e| LitpError::Credentials(format!("{}: {e}", path.display())))
}

enum Cipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl Cipher {
    fn new(key: &[u8]) -> LitpResult<Self> {
        let bad = |_| LitpError::Credentials(format!("unsupported key length {}", key.len()));
        Ok(match key.len() {
            16 => Self::Aes128(Aes128::new_from_slice(key).map_err(bad)?),
            24 => Self::Aes192(Aes192::new_from_slice(key).map_err(bad)?),
            32 => Self::Aes256(Aes256::new_from_slice(key).map_err(bad)?),
            n => return Err(LitpError::Credentials(format!("unsupported key length {n}"))),
        })
    }

    fn encrypt_block(&self, block: &mut Block) {
        match self {
            Self::Aes128(c) => c.encrypt_block(block),
            Self::Aes192(c) => c.encrypt_block(block),
            Self::Aes256(c) => c.encrypt_block(block),
        }
    }

    /// CFB with 128 bit segments. The feedback register is the previous
    /// ciphertext block.
    fn cfb_decrypt(&self, data: &[u8]) -> Vec<u8> {
        let mut register = Block::clone_from_slice(&IV);
        let mut out = Vec::with_capacity(data.len());
        for chunk in data.chunks(16) {
            let mut stream = register;
            self.encrypt_block(&mut stream);
            out.extend(chunk.iter().zip(stream.iter()).map(|(c, k)| c ^ k));
            if chunk.len() == 16 {
                register = Block::clone_from_slice(chunk);
            }
        }
        out
    }
}

/// Decrypts a base64 ciphertext with the shared keyset key.
pub fn decrypt(key: &[u8], encoded: &str) -> LitpResult<String> {
    let data = STANDARD
        .decode(encoded.trim())
        .map_err(|e| LitpError::Credentials(format!("ciphertext is not base64: {e}")))?;
    let plain = Cipher::new(key)?.cfb_decrypt(&data);
    let text = String::from_utf8(plain)
        .map_err(|_| LitpError::Credentials("decrypted password is not valid text".into()))?;
    Ok(text.trim_end_matches(END_OF_TEXT).to_string())
}

/// Password store backed by the keyset and password files named in the
/// security configuration. Files are read on first use.
#[derive(Debug)]
pub struct LitpPasswordStore {
    conf: PathBuf,
    loaded: Mutex<Option<(Vec<u8>, Ini)>>,
}

impl Default for LitpPasswordStore {
    fn default() -> Self {
        Self::new(SECURITY_CONF)
    }
}

impl LitpPasswordStore {
    pub fn new(conf: impl Into<PathBuf>) -> Self {
        Self { conf: conf.into(), loaded: Mutex::new(None) }
    }

    fn load(&self) -> LitpResult<(Vec<u8>, Ini)> {
        let conf = parse_ini(&read(&self.conf)?);
        let lookup = |section: &str| {
            conf.get(section).and_then(|s| s.get("path")).map(PathBuf::from).ok_or_else(|| {
                LitpError::Credentials(format!("{}: no [{section}] path", self.conf.display()))
            })
        };
        let keyset = read(&lookup("keyset")?)?;
        let key_line = keyset.lines().next().unwrap_or_default();
        let key = STANDARD
            .decode(key_line.trim())
            .map_err(|e| LitpError::Credentials(format!("keyset is not base64: {e}")))?;
        let passwords = parse_ini(&read(&lookup("password")?)?);
        Ok((key, passwords))
    }
}

impl PasswordStore for LitpPasswordStore {
    fn password(&self, key: &str, username: &str) -> LitpResult<String> {
        let mut loaded = self
            .loaded
            .lock()
            .map_err(|_| LitpError::Credentials("password store lock poisoned".into()))?;
        if loaded.is_none() {
            *loaded = Some(self.load()?);
        }
        let Some((aes_key, passwords)) = loaded.as_ref() else {
            return Err(LitpError::Credentials("password store not loaded".into()));
        };
        let section = passwords
            .get(key)
            .ok_or_else(|| LitpError::Credentials(format!("no password entries for {key}")))?;
        // entries are keyed by the unpadded base64 of the user, older ones by the plain name
        let encoded_user = STANDARD.encode(username).trim_end_matches('=').to_string();
        let cipher = section
            .get(&encoded_user)
            .or_else(|| section.get(username))
            .ok_or_else(|| LitpError::Credentials(format!("no password for {username} under {key}")))?;
        decrypt(aes_key, cipher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encrypt(key: &[u8], plain: &str) -> String {
        let cipher = Cipher::new(key).unwrap();
        let mut padded = plain.as_bytes().to_vec();
        padded.push(3);
        let mut register = Block::clone_from_slice(&IV);
        let mut out = Vec::new();
        for chunk in padded.chunks(16) {
            let mut stream = register;
            cipher.encrypt_block(&mut stream);
            let block: Vec<u8> = chunk.iter().zip(stream.iter()).map(|(p, k)| p ^ k).collect();
            if block.len() == 16 {
                register = Block::clone_from_slice(&block);
            }
            out.extend(block);
        }
        STANDARD.encode(out)
    }

    #[test]
    fn decrypt_inverts_cfb_and_strips_terminator() {
        let key = [7u8; 16];
        let encoded = encrypt(&key, "a-much-longer-password-than-one-block");
        assert_eq!(decrypt(&key, &encoded).unwrap(), "a-much-longer-password-than-one-block");
    }

    #[test]
    fn rejects_odd_key_lengths() {
        assert!(matches!(decrypt(&[1u8; 10], "AAAA"), Err(LitpError::Credentials(_))));
    }

    #[test]
    fn store_reads_files_named_in_security_conf() {
        let dir = tempfile::tempdir().unwrap();
        let key = [9u8; 32];
        let keyset = dir.path().join("keyset");
        std::fs::write(&keyset, format!("{}\n", STANDARD.encode(key))).unwrap();
        let user = STANDARD.encode("root").trim_end_matches('=').to_string();
        let shadow = dir.path().join("passwords");
        std::fs::write(
            &shadow,
            format!(
                "[key-for-blade]\n{user} = {}\n\n[key-for-old]\nadmin = {}\n",
                encrypt(&key, "s3cret"),
                encrypt(&key, "legacy")
            ),
        )
        .unwrap();
        let conf = dir.path().join("litp_security.conf");
        std::fs::write(
            &conf,
            format!("[keyset]\npath = {}\n[password]\npath = {}\n", keyset.display(), shadow.display()),
        )
        .unwrap();

        let store = LitpPasswordStore::new(&conf);
        assert_eq!(store.password("key-for-blade", "root").unwrap(), "s3cret");
        assert_eq!(store.password("key-for-old", "admin").unwrap(), "legacy");
        assert!(store.password("key-for-blade", "nobody").is_err());
        assert!(store.password("missing", "root").is_err());
    }
}
