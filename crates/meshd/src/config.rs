use camino::Utf8Path;
use edgemesh_network::config::{BootstrapConfig, DiscoveryConfig, SwarmConfig};
use edgemesh_syncer::SyncerConfig;
use eyre::{Result as EyreResult, WrapErr};
use libp2p::identity::Keypair;
use serde::{Deserialize, Serialize};
use tokio::fs::{read_to_string, write};

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(with = "serde_identity", default = "Keypair::generate_ed25519")]
    pub identity: Keypair,

    pub swarm: SwarmConfig,

    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub sync: SyncerConfig,

    pub application: ApplicationConfig,
}

/// Static descriptor of the application endpoint this node advertises.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub name: String,

    #[serde(default)]
    pub tag: String,

    pub app_origin: String,

    pub model_hash: String,

    #[serde(default = "default_gauge_max")]
    pub gauge_max: u64,

    /// Key reference resolved by the secrets manager.
    #[serde(default)]
    pub signing_key: String,
}

const fn default_gauge_max() -> u64 {
    4
}

impl ConfigFile {
    pub fn exists(dir: &Utf8Path) -> bool {
        dir.join(CONFIG_FILE).is_file()
    }

    pub async fn load(dir: &Utf8Path) -> EyreResult<Self> {
        let path = dir.join(CONFIG_FILE);
        let content = read_to_string(&path)
            .await
            .wrap_err_with(|| format!("failed to read {}", path))?;

        toml::from_str(&content).map_err(Into::into)
    }

    pub async fn save(&self, dir: &Utf8Path) -> EyreResult<()> {
        let path = dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)?;

        write(&path, content)
            .await
            .wrap_err_with(|| format!("failed to write {}", path))
    }
}

mod serde_identity {
    use core::fmt::{self, Formatter};

    use libp2p::identity::Keypair;
    use serde::de::{self, MapAccess};
    use serde::ser::{self, SerializeMap};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(key: &Keypair, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut keypair = serializer.serialize_map(Some(2))?;
        keypair.serialize_entry("peer_id", &key.public().to_peer_id().to_base58())?;
        keypair.serialize_entry(
            "keypair",
            &hex::encode(key.to_protobuf_encoding().map_err(ser::Error::custom)?),
        )?;
        keypair.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Keypair, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IdentityVisitor;

        impl<'de> de::Visitor<'de> for IdentityVisitor {
            type Value = Keypair;

            fn expecting(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
                formatter.write_str("an identity")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut peer_id = None::<String>;
                let mut priv_key = None::<String>;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "peer_id" => peer_id = Some(map.next_value()?),
                        "keypair" => priv_key = Some(map.next_value()?),
                        _ => {
                            drop(map.next_value::<de::IgnoredAny>());
                        }
                    }
                }

                let peer_id = peer_id.ok_or_else(|| de::Error::missing_field("peer_id"))?;
                let priv_key = priv_key.ok_or_else(|| de::Error::missing_field("keypair"))?;

                let priv_key = hex::decode(priv_key)
                    .map_err(|_| de::Error::custom("invalid hex keypair"))?;

                let keypair = Keypair::from_protobuf_encoding(&priv_key)
                    .map_err(|_| de::Error::custom("invalid keypair"))?;

                if keypair.public().to_peer_id().to_base58() != peer_id {
                    return Err(de::Error::custom("keypair does not match peer id"));
                }

                Ok(keypair)
            }
        }

        deserializer.deserialize_map(IdentityVisitor)
    }
}
