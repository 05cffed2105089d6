//! rosbridge over a raw TCP socket in BSON-only mode.

use simbridge_sdk::{Endpoint, TransportError};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::framing::{read_frame, write_frame};
use crate::link::{Link, LinkTasks};

/// Connect and spawn the writer and reader tasks.
pub(crate) async fn open(endpoint: &Endpoint, link: Link) -> Result<LinkTasks, TransportError> {
    let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await?;
    stream.set_nodelay(true)?;
    let (mut reader, mut writer) = stream.into_split();
    debug!(endpoint = %endpoint, "TCP link open");

    let Link {
        mut outgoing,
        replies,
        dispatcher,
    } = link;

    let writer_task = tokio::spawn(async move {
        while let Some(frame) = outgoing.recv().await {
            if let Err(e) = write_frame(&mut writer, &frame).await {
                warn!(error = %e, "Failed to write frame");
                break;
            }
        }
    });

    let reader_task = tokio::spawn(async move {
        loop {
            match read_frame(&mut reader).await {
                Ok(Some(frame)) => dispatcher.dispatch(frame, &replies),
                Ok(None) => {
                    info!("Bridge closed the connection");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read frame");
                    break;
                }
            }
        }
    });

    Ok(LinkTasks {
        writer: writer_task,
        reader: reader_task,
    })
}
