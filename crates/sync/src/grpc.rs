//! Remote directory over gRPC.

use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use prost_types::Timestamp;
use reldir_proto::proto::{exporter_client::ExporterClient, model_client::ModelClient};
use reldir_types::{ExportRequest, GetManifestRequest, config::SyncConfig};
use snafu::{OptionExt, ResultExt};
use tonic::{
    metadata::MetadataValue,
    transport::{Channel, Endpoint},
};
use tracing::{debug, instrument};

use crate::{
    error::{ConnectSnafu, InvalidAddressSnafu, InvalidMetadataSnafu, RemoteSnafu, Result, SyncError},
    remote::{ExportStream, ManifestStream, RemoteDirectory},
};

const HTTP2_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
const TCP_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Exporter and model clients sharing one channel.
///
/// Every request carries `authorization: basic <api_key>` and `tenant-id`
/// metadata when configured.
#[derive(Clone)]
pub struct GrpcRemote {
    channel: Channel,
    authorization: Option<MetadataValue<tonic::metadata::Ascii>>,
    tenant_id: Option<MetadataValue<tonic::metadata::Ascii>>,
}

impl std::fmt::Debug for GrpcRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcRemote")
            .field("authorization", &self.authorization.as_ref().map(|_| "<redacted>"))
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}

impl GrpcRemote {
    /// Connects to `config.remote_address`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAddress`, `InvalidMetadata` for credentials that are
    /// not valid header values, or `Connect`.
    #[instrument(skip_all, fields(address = %config.remote_address))]
    pub async fn connect(config: &SyncConfig) -> Result<Self> {
        let address = config.remote_address.clone();
        let endpoint = Endpoint::from_shared(address.clone())
            .ok()
            .context(InvalidAddressSnafu { address: address.clone() })?
            .connect_timeout(config.connect_timeout)
            .tcp_nodelay(true)
            .tcp_keepalive(Some(TCP_KEEPALIVE_INTERVAL))
            .http2_keep_alive_interval(HTTP2_KEEPALIVE_INTERVAL);
        let channel = endpoint.connect().await.context(ConnectSnafu { address })?;
        debug!("Connected to remote directory");
        Self::with_channel(channel, config.api_key.as_deref(), config.tenant_id.as_deref())
    }

    /// Wraps an existing channel.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMetadata` for credentials that are not valid header
    /// values.
    pub fn with_channel(channel: Channel, api_key: Option<&str>, tenant_id: Option<&str>) -> Result<Self> {
        let authorization = api_key
            .map(|key| {
                MetadataValue::try_from(format!("basic {key}"))
                    .ok()
                    .context(InvalidMetadataSnafu { name: "authorization" })
            })
            .transpose()?;
        let tenant_id = tenant_id
            .map(|id| MetadataValue::try_from(id).ok().context(InvalidMetadataSnafu { name: "tenant-id" }))
            .transpose()?;
        Ok(Self { channel, authorization, tenant_id })
    }

    fn request<T>(&self, message: T) -> tonic::Request<T> {
        let mut request = tonic::Request::new(message);
        let metadata = request.metadata_mut();
        if let Some(value) = &self.authorization {
            metadata.insert("authorization", value.clone());
        }
        if let Some(value) = &self.tenant_id {
            metadata.insert("tenant-id", value.clone());
        }
        request
    }
}

impl RemoteDirectory for GrpcRemote {
    async fn export(&self, options: u32, start_from: Option<Timestamp>) -> Result<ExportStream> {
        let mut client = ExporterClient::new(self.channel.clone());
        let response = client
            .export(self.request(ExportRequest { options, start_from }))
            .await
            .context(RemoteSnafu)?;
        Ok(response.into_inner().map_err(|source| SyncError::Remote { source }).boxed())
    }

    async fn get_manifest(&self) -> Result<ManifestStream> {
        let mut client = ModelClient::new(self.channel.clone());
        let response = client
            .get_manifest(self.request(GetManifestRequest {}))
            .await
            .context(RemoteSnafu)?;
        Ok(response.into_inner().map_err(|source| SyncError::Remote { source }).boxed())
    }
}
