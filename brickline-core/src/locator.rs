//! Device locator
//!
//! Opens each candidate in turn and asks it for its battery level. The
//! first candidate that answers is the brick.

use brickline_hal::Stream;

use crate::link::{Connection, LinkError};
use crate::routine;

/// Find the first candidate that answers a battery probe
///
/// `open` turns a candidate (a device path, an address, a ready stream)
/// into a stream. Candidates that fail to open or to answer are skipped.
pub fn find_brick<C, S, F>(candidates: C, mut open: F) -> Result<Connection<S>, LinkError>
where
    C: IntoIterator,
    S: Stream,
    F: FnMut(C::Item) -> Result<S, LinkError>,
{
    for (index, candidate) in candidates.into_iter().enumerate() {
        let stream = match open(candidate) {
            Ok(stream) => stream,
            Err(e) => {
                debug!("candidate {}: open failed: {:?}", index, e);
                continue;
            }
        };

        let mut conn = Connection::new(stream);
        match routine::get_voltage(&mut conn) {
            Ok(volts) => {
                debug!("candidate {}: brick found ({} V)", index, volts);
                return Ok(conn);
            }
            Err(e) => {
                debug!("candidate {}: no answer: {:?}", index, e);
            }
        }
    }
    Err(LinkError::DeviceNotFound)
}
