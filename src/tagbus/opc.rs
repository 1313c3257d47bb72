//! OPC UA implementation of the tag bus.
//!
//! The `opcua` client is synchronous and drives its own runtime, so each
//! transaction runs on tokio's blocking pool: build a client, connect
//! anonymously, read or write the `Value` attribute, disconnect.

use super::TagBus;
use crate::error::{TagError, TagResult};
use crate::types::{TagId, TagValue};
use async_trait::async_trait;
use opcua::client::prelude::*;
use opcua::sync::RwLock;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Default endpoint of the tag server.
pub const DEFAULT_ENDPOINT: &str = "opc.tcp://0.0.0.0:4840";

/// Tag bus backed by an OPC UA server.
#[derive(Debug, Clone)]
pub struct OpcUaTagBus {
    endpoint: String,
    pki_dir: PathBuf,
}

impl OpcUaTagBus {
    /// Create a tag bus for `endpoint`, keeping client certificates under `pki_dir`.
    pub fn new(endpoint: impl Into<String>, pki_dir: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: endpoint.into(),
            pki_dir: pki_dir.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn connect_error(&self, reason: impl Into<String>) -> TagError {
        TagError::Connect {
            endpoint: self.endpoint.clone(),
            reason: reason.into(),
        }
    }

    fn connect(&self) -> TagResult<(Client, Arc<RwLock<Session>>)> {
        let mut client = ClientBuilder::new()
            .application_name("scantag")
            .application_uri("urn:scantag")
            .product_uri("urn:scantag")
            .pki_dir(self.pki_dir.clone())
            .create_sample_keypair(false)
            .trust_server_certs(true)
            .session_retry_limit(0)
            .client()
            .ok_or_else(|| self.connect_error("invalid client configuration"))?;

        let session = client
            .connect_to_endpoint(
                (
                    self.endpoint.as_str(),
                    SecurityPolicy::None.to_str(),
                    MessageSecurityMode::None,
                    UserTokenPolicy::anonymous(),
                ),
                IdentityToken::Anonymous,
            )
            .map_err(|status| self.connect_error(status.to_string()))?;

        Ok((client, session))
    }

    fn read_blocking(&self, tag: &TagId) -> TagResult<TagValue> {
        let node_id = parse_node_id(tag)?;
        let (_client, session) = self.connect()?;

        let request = ReadValueId {
            node_id,
            attribute_id: AttributeId::Value as u32,
            index_range: UAString::null(),
            data_encoding: QualifiedName::null(),
        };
        let result = session
            .read()
            .read(&[request], TimestampsToReturn::Neither, 0.0);
        session.read().disconnect();

        let read_error = |reason: String| TagError::Read {
            tag: tag.to_string(),
            reason,
        };
        let data_value = result
            .map_err(|status| read_error(status.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| read_error("empty response".into()))?;

        if let Some(status) = data_value.status {
            if !status.is_good() {
                return Err(read_error(status.to_string()));
            }
        }

        let variant = data_value
            .value
            .ok_or_else(|| read_error("no value".into()))?;
        let value = from_variant(variant)?;
        debug!(tag = %tag, value = %value, "tag read");
        Ok(value)
    }

    fn write_blocking(&self, tag: &TagId, value: TagValue) -> TagResult<()> {
        let node_id = parse_node_id(tag)?;
        let variant = to_variant(tag, &value)?;
        let (_client, session) = self.connect()?;

        let request = WriteValue {
            node_id,
            attribute_id: AttributeId::Value as u32,
            index_range: UAString::null(),
            value: DataValue::value_only(variant),
        };
        let result = session.read().write(&[request]);
        session.read().disconnect();

        let write_error = |reason: String| TagError::Write {
            tag: tag.to_string(),
            reason,
        };
        let statuses = result.map_err(|status| write_error(status.to_string()))?;
        match statuses.first() {
            Some(status) if status.is_good() => {
                debug!(tag = %tag, value = %value, "tag written");
                Ok(())
            }
            Some(status) => Err(write_error(status.to_string())),
            None => Err(write_error("empty response".into())),
        }
    }
}

#[async_trait]
impl TagBus for OpcUaTagBus {
    async fn read_tag(&self, tag: &TagId) -> TagResult<TagValue> {
        let bus = self.clone();
        let owned = tag.clone();
        tokio::task::spawn_blocking(move || bus.read_blocking(&owned))
            .await
            .map_err(|e| TagError::Read {
                tag: tag.to_string(),
                reason: e.to_string(),
            })?
    }

    async fn write_tag(&self, tag: &TagId, value: TagValue) -> TagResult<()> {
        let bus = self.clone();
        let owned = tag.clone();
        tokio::task::spawn_blocking(move || bus.write_blocking(&owned, value))
            .await
            .map_err(|e| TagError::Write {
                tag: tag.to_string(),
                reason: e.to_string(),
            })?
    }
}

fn parse_node_id(tag: &TagId) -> TagResult<NodeId> {
    NodeId::from_str(tag.as_str()).map_err(|_| TagError::InvalidTag(tag.to_string()))
}

fn to_variant(tag: &TagId, value: &TagValue) -> TagResult<Variant> {
    Ok(match value {
        TagValue::Bool(b) => Variant::Boolean(*b),
        TagValue::Int(n) => {
            let n = i32::try_from(*n).map_err(|_| TagError::Write {
                tag: tag.to_string(),
                reason: format!("{} does not fit in Int32", n),
            })?;
            Variant::Int32(n)
        }
        TagValue::Float(x) => Variant::Double(*x),
        TagValue::Text(s) => Variant::String(UAString::from(s.as_str())),
    })
}

fn from_variant(variant: Variant) -> TagResult<TagValue> {
    Ok(match variant {
        Variant::Boolean(b) => TagValue::Bool(b),
        Variant::SByte(n) => TagValue::Int(n.into()),
        Variant::Byte(n) => TagValue::Int(n.into()),
        Variant::Int16(n) => TagValue::Int(n.into()),
        Variant::UInt16(n) => TagValue::Int(n.into()),
        Variant::Int32(n) => TagValue::Int(n.into()),
        Variant::UInt32(n) => TagValue::Int(n.into()),
        Variant::Int64(n) => TagValue::Int(n),
        Variant::UInt64(n) => TagValue::Int(
            i64::try_from(n).map_err(|_| TagError::UnsupportedValue(format!("UInt64 {}", n)))?,
        ),
        Variant::Float(x) => TagValue::Float(x.into()),
        Variant::Double(x) => TagValue::Float(x),
        Variant::String(s) => TagValue::Text(s.value().clone().unwrap_or_default()),
        other => return Err(TagError::UnsupportedValue(format!("{:?}", other))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_mapping() {
        let tag = TagId::from("ns=1;i=1");
        assert_eq!(
            to_variant(&tag, &TagValue::Bool(true)).unwrap(),
            Variant::Boolean(true)
        );
        assert_eq!(
            to_variant(&tag, &TagValue::Int(42)).unwrap(),
            Variant::Int32(42)
        );
        assert!(to_variant(&tag, &TagValue::Int(i64::MAX)).is_err());

        assert_eq!(from_variant(Variant::UInt16(7)).unwrap(), TagValue::Int(7));
        assert_eq!(
            from_variant(Variant::String(UAString::from("A1"))).unwrap(),
            TagValue::Text("A1".into())
        );
        assert!(from_variant(Variant::Empty).is_err());
    }

    #[test]
    fn test_endpoint_is_kept() {
        let bus = OpcUaTagBus::new("opc.tcp://plc:4840", "/tmp/pki");
        assert_eq!(bus.endpoint(), "opc.tcp://plc:4840");
    }

    #[test]
    fn test_node_id_parsing() {
        assert!(parse_node_id(&TagId::numeric(1, 100001)).is_ok());
        assert!(matches!(
            parse_node_id(&TagId::from("not a node")),
            Err(TagError::InvalidTag(_))
        ));
    }
}
