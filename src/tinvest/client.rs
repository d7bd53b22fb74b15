use super::convert;
use super::proto;
use super::{ApiError, MarketDataApi};
use crate::db::postgres::models::{
    candle::Candle,
    dividend::Dividend,
    instrument::{Instrument, InstrumentType},
};
use crate::env_config::models::app_config::TinvestConfig;
use crate::services::candles::resolution::Resolution;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::AsciiMetadataValue;
use tonic::transport::{Channel, ClientTlsConfig};
use tracing::{debug, error, info, warn};

const GET_CANDLES: &str = "/tinkoff.public.invest.api.contract.v1.MarketDataService/GetCandles";
const SHARES: &str = "/tinkoff.public.invest.api.contract.v1.InstrumentsService/Shares";
const BONDS: &str = "/tinkoff.public.invest.api.contract.v1.InstrumentsService/Bonds";
const ETFS: &str = "/tinkoff.public.invest.api.contract.v1.InstrumentsService/Etfs";
const GET_DIVIDENDS: &str = "/tinkoff.public.invest.api.contract.v1.InstrumentsService/GetDividends";

/// gRPC client of the T-Invest API over a single TLS channel.
#[derive(Clone)]
pub struct TinvestClient {
    channel: Channel,
    authorization: AsciiMetadataValue,
    app_name: Option<AsciiMetadataValue>,
}

impl TinvestClient {
    pub async fn connect(config: &TinvestConfig, token: &str) -> Result<Self, ApiError> {
        info!("Connecting to T-Invest API at {}", config.endpoint);

        let authorization = AsciiMetadataValue::try_from(format!("Bearer {}", token))
            .map_err(|_| ApiError::InvalidToken)?;
        let app_name = match AsciiMetadataValue::try_from(config.app_name.as_str()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("App name '{}' is not a valid header value, not sending it", config.app_name);
                None
            }
        };

        let connect_error = |source| ApiError::Connect {
            endpoint: config.endpoint.clone(),
            source,
        };

        let channel = Channel::from_shared(config.endpoint.clone())
            .map_err(|_| ApiError::InvalidEndpoint(config.endpoint.clone()))?
            .tls_config(ClientTlsConfig::new().with_webpki_roots())
            .map_err(connect_error)?
            .timeout(Duration::from_secs(config.timeout))
            .connect_timeout(Duration::from_secs(config.timeout))
            .connect()
            .await
            .map_err(|e| {
                error!("Failed to connect to T-Invest API: {}", e);
                connect_error(e)
            })?;

        info!("T-Invest API channel established");
        Ok(Self {
            channel,
            authorization,
            app_name,
        })
    }

    async fn unary<Req, Resp>(&self, path: &'static str, message: Req) -> Result<Resp, ApiError>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let method = path.rsplit('/').next().unwrap_or(path);

        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready().await.map_err(|e| ApiError::Status {
            method,
            status: tonic::Status::unavailable(format!("service was not ready: {}", e)),
        })?;

        let mut request = tonic::Request::new(message);
        request
            .metadata_mut()
            .insert("authorization", self.authorization.clone());
        if let Some(app_name) = &self.app_name {
            request.metadata_mut().insert("x-app-name", app_name.clone());
        }

        let codec = tonic::codec::ProstCodec::<Req, Resp>::default();
        let response = grpc
            .unary(request, PathAndQuery::from_static(path), codec)
            .await
            .map_err(|status| {
                error!("{} failed: {}", method, status);
                ApiError::Status { method, status }
            })?;

        Ok(response.into_inner())
    }
}

#[async_trait]
impl MarketDataApi for TinvestClient {
    async fn fetch_candles(
        &self,
        figi: &str,
        resolution: Resolution,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>, ApiError> {
        debug!("GetCandles {} {} [{}, {})", figi, resolution, from, to);

        let request = proto::GetCandlesRequest {
            from: Some(convert::to_timestamp(from)),
            to: Some(convert::to_timestamp(to)),
            interval: convert::candle_interval(resolution) as i32,
            instrument_id: Some(figi.to_string()),
        };
        let response: proto::GetCandlesResponse = self.unary(GET_CANDLES, request).await?;

        let candles: Vec<Candle> = response
            .candles
            .iter()
            .filter_map(convert::candle_from_proto)
            .collect();

        debug!("GetCandles {} returned {} candles", figi, candles.len());
        Ok(candles)
    }

    async fn list_instruments_by_type(
        &self,
        instrument_type: InstrumentType,
    ) -> Result<Vec<Instrument>, ApiError> {
        let request = proto::InstrumentsRequest {
            instrument_status: proto::InstrumentStatus::All as i32,
        };

        let instruments: Vec<Instrument> = match instrument_type {
            InstrumentType::Share => {
                let response: proto::SharesResponse = self.unary(SHARES, request).await?;
                response
                    .instruments
                    .into_iter()
                    .map(convert::share_to_instrument)
                    .collect()
            }
            InstrumentType::Bond => {
                let response: proto::BondsResponse = self.unary(BONDS, request).await?;
                response
                    .instruments
                    .into_iter()
                    .map(convert::bond_to_instrument)
                    .collect()
            }
            InstrumentType::Etf => {
                let response: proto::EtfsResponse = self.unary(ETFS, request).await?;
                response
                    .instruments
                    .into_iter()
                    .map(convert::etf_to_instrument)
                    .collect()
            }
        };

        debug!("Received {} instruments of type {}", instruments.len(), instrument_type);
        Ok(instruments)
    }

    async fn fetch_dividends(
        &self,
        figi: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Dividend>, ApiError> {
        debug!("GetDividends {} [{}, {}]", figi, from, to);

        let request = proto::GetDividendsRequest {
            from: Some(convert::to_timestamp(from)),
            to: Some(convert::to_timestamp(to)),
            instrument_id: Some(figi.to_string()),
        };
        let response: proto::GetDividendsResponse = self.unary(GET_DIVIDENDS, request).await?;

        let total = response.dividends.len();
        let dividends: Vec<Dividend> = response
            .dividends
            .iter()
            .filter_map(|d| convert::dividend_from_proto(figi, d))
            .collect();

        if dividends.len() < total {
            warn!(
                "Skipped {} dividends of {} without a payment date",
                total - dividends.len(),
                figi
            );
        }
        Ok(dividends)
    }
}
