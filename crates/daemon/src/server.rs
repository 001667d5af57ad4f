// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use pj_core::{IdGen, JobSpec};
use pj_daemon::protocol::{self, ProtocolError, Request, Response, DEFAULT_TIMEOUT};
use pj_daemon::PROTOCOL_VERSION;
use pj_engine::SchedulerHandle;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info};

/// Serve one request/response exchange
pub async fn handle_connection<G, S>(pool: &SchedulerHandle<G>, stream: S) -> Result<(), ServerError>
where
    G: IdGen,
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);

    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!("Received request: {:?}", request);
    let response = handle_request(pool, request);
    debug!("Sending response: {:?}", response);

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

/// Answer a single request
pub fn handle_request<G: IdGen>(pool: &SchedulerHandle<G>, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version } => {
            if version != PROTOCOL_VERSION {
                info!(client = %version, daemon = PROTOCOL_VERSION, "client version differs");
            }
            Response::Hello {
                version: PROTOCOL_VERSION.to_string(),
            }
        }

        Request::Submit { name, payload } => {
            if name.trim().is_empty() {
                return Response::Error {
                    message: "job name must not be empty".to_string(),
                };
            }
            match pool.submit(JobSpec::new(name, payload)) {
                Ok(id) => {
                    info!(job_id = %id, "job submitted");
                    Response::Submitted { id }
                }
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            }
        }

        Request::Status => Response::Jobs {
            jobs: pool.status(),
        },

        Request::Workers => Response::Workers {
            workers: pool.workers(),
        },

        Request::Shutdown => {
            pool.stop();
            Response::ShuttingDown
        }
    }
}

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Request timeout")]
    Timeout,
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
