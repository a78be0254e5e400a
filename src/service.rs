//! CIP service requests.
//!
//! Every request has the same shape:
//!
//! ```text
//! service (u8) | path size in words (u8) | encoded path | service data
//! ```
//!
//! The path is produced by [`encode_path`](crate::path::encode_path) and is
//! always an even number of bytes.
//!
//! # Request Types
//!
//! ## Tag Services
//! - [`ReadTagRequest`] - Read Tag (0x4C)
//! - [`ReadFragmentRequest`] - Read Tag Fragmented (0x52)
//! - [`WriteTagRequest`] - Write Tag (0x4D)
//! - [`WriteFragmentRequest`] - Write Tag Fragmented (0x53)
//! - [`ReadModifyWriteRequest`] - Read-Modify-Write (0x4E), atomic bit set/clear
//! - [`MultipleServiceRequest`] - Multiple Service Packet (0x0A)
//!
//! ## Connection Manager
//! - [`UnconnectedSend`] - routes a request through a backplane
//! - [`ForwardOpenRequest`] / [`ForwardCloseRequest`] - connected messaging
//!
//! ## Segmentation
//! - [`FragmentPlan`] - offsets and sizes of a fragmented read or write
//!
//! # Example
//!
//! ```
//! use ab_eip::service::ReadTagRequest;
//! use ab_eip::{encode_path, TagPath};
//!
//! let path = encode_path(&TagPath::new().symbol("Counter")).unwrap();
//! let request = ReadTagRequest::new(&path, 1).unwrap();
//! assert_eq!(request.to_bytes()[..2], [0x4C, 0x05]);
//! ```

use crate::data_type::TagType;
use crate::error::{EipError, Result};

/// Get Attribute List.
pub const SERVICE_GET_ATTRIBUTE_LIST: u8 = 0x03;
/// Multiple Service Packet.
pub const SERVICE_MULTIPLE: u8 = 0x0A;
/// Read Tag.
pub const SERVICE_READ_TAG: u8 = 0x4C;
/// Write Tag.
pub const SERVICE_WRITE_TAG: u8 = 0x4D;
/// Read-Modify-Write Tag.
pub const SERVICE_READ_MODIFY_WRITE: u8 = 0x4E;
/// Read Tag Fragmented.
pub const SERVICE_READ_FRAGMENT: u8 = 0x52;
/// Write Tag Fragmented.
pub const SERVICE_WRITE_FRAGMENT: u8 = 0x53;
/// Get Instance Attribute List (symbol enumeration).
pub const SERVICE_GET_INSTANCE_ATTRIBUTE_LIST: u8 = 0x55;
/// Forward Close (Connection Manager).
pub const SERVICE_FORWARD_CLOSE: u8 = 0x4E;
/// Unconnected Send (Connection Manager).
pub const SERVICE_UNCONNECTED_SEND: u8 = 0x52;
/// Forward Open (Connection Manager).
pub const SERVICE_FORWARD_OPEN: u8 = 0x54;

/// Bit set in the service code of a reply.
pub const REPLY_FLAG: u8 = 0x80;

/// Path of the Message Router (class 0x02, instance 1).
pub const MESSAGE_ROUTER_PATH: [u8; 4] = [0x20, 0x02, 0x24, 0x01];
/// Path of the Connection Manager (class 0x06, instance 1).
pub const CONNECTION_MANAGER_PATH: [u8; 4] = [0x20, 0x06, 0x24, 0x01];

/// Priority/time tick of Connection Manager requests.
pub const PRIORITY_TIME_TICK: u8 = 0x0A;
/// Timeout ticks of Unconnected Send.
pub const UNCONNECTED_TIMEOUT_TICKS: u8 = 0xF0;
/// Timeout ticks of Forward Open / Forward Close.
pub const CONNECTION_TIMEOUT_TICKS: u8 = 0x0E;

/// Connection size requested by Forward Open.
pub const CONNECTION_SIZE: u16 = 500;
/// Point-to-point, variable size, low priority.
const CONNECTION_PARAMS_BASE: u16 = 0x4200;
/// Server transport, class 3, application object trigger.
const TRANSPORT_CLASS_TRIGGER: u8 = 0xA3;
/// RPI multiplier for the inactivity timeout (x4).
const CONNECTION_TIMEOUT_MULTIPLIER: u8 = 0x02;

/// Size of a Read-Modify-Write mask in bytes.
pub const RMW_MASK_SIZE: u16 = 4;

/// Builds `[service, path words, path, data]`.
///
/// # Errors
///
/// Returns `InvalidParameter` if the path has an odd length or is longer
/// than 255 words.
pub fn encode_request(service: u8, path: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if path.len() % 2 != 0 {
        return Err(EipError::invalid_parameter(
            "path",
            format!("encoded path must have an even length, got {}", path.len()),
        ));
    }
    let words = path.len() / 2;
    if words > u8::MAX as usize {
        return Err(EipError::invalid_parameter(
            "path",
            format!("encoded path of {words} words exceeds 255"),
        ));
    }

    let mut request = Vec::with_capacity(2 + path.len() + data.len());
    request.push(service);
    request.push(words as u8);
    request.extend_from_slice(path);
    request.extend_from_slice(data);
    Ok(request)
}

fn check_elements(elements: u16) -> Result<()> {
    if elements == 0 {
        return Err(EipError::invalid_parameter("elements", "must be at least 1"));
    }
    Ok(())
}

/// Read Tag (0x4C).
#[derive(Debug, Clone)]
pub struct ReadTagRequest {
    request: Vec<u8>,
}

impl ReadTagRequest {
    /// Creates a read of `elements` elements.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `elements` is 0 or the path is invalid.
    pub fn new(path: &[u8], elements: u16) -> Result<Self> {
        check_elements(elements)?;
        Ok(Self {
            request: encode_request(SERVICE_READ_TAG, path, &elements.to_le_bytes())?,
        })
    }

    /// Serializes the request.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.request.clone()
    }
}

/// Read Tag Fragmented (0x52).
#[derive(Debug, Clone)]
pub struct ReadFragmentRequest {
    request: Vec<u8>,
    offset: u32,
}

impl ReadFragmentRequest {
    /// Creates a read of `elements` elements starting at byte `offset`.
    pub fn new(path: &[u8], elements: u16, offset: u32) -> Result<Self> {
        check_elements(elements)?;
        let mut data = Vec::with_capacity(6);
        data.extend_from_slice(&elements.to_le_bytes());
        data.extend_from_slice(&offset.to_le_bytes());
        Ok(Self {
            request: encode_request(SERVICE_READ_FRAGMENT, path, &data)?,
            offset,
        })
    }

    /// Returns the byte offset.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Serializes the request.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.request.clone()
    }
}

/// Write Tag (0x4D).
#[derive(Debug, Clone)]
pub struct WriteTagRequest {
    request: Vec<u8>,
}

impl WriteTagRequest {
    /// Creates a write of `elements` elements of `tag_type`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `elements` is 0, `data` is empty or the
    /// path is invalid.
    pub fn new(path: &[u8], tag_type: TagType, elements: u16, data: &[u8]) -> Result<Self> {
        check_elements(elements)?;
        if data.is_empty() {
            return Err(EipError::invalid_parameter("data", "cannot be empty"));
        }
        let mut body = tag_type.to_bytes();
        body.extend_from_slice(&elements.to_le_bytes());
        body.extend_from_slice(data);
        Ok(Self {
            request: encode_request(SERVICE_WRITE_TAG, path, &body)?,
        })
    }

    /// Serializes the request.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.request.clone()
    }
}

/// Write Tag Fragmented (0x53).
#[derive(Debug, Clone)]
pub struct WriteFragmentRequest {
    request: Vec<u8>,
    offset: u32,
}

impl WriteFragmentRequest {
    /// Creates a write of one fragment; `elements` counts the whole tag.
    pub fn new(
        path: &[u8],
        tag_type: TagType,
        elements: u16,
        offset: u32,
        data: &[u8],
    ) -> Result<Self> {
        check_elements(elements)?;
        if data.is_empty() {
            return Err(EipError::invalid_parameter("data", "cannot be empty"));
        }
        let mut body = tag_type.to_bytes();
        body.extend_from_slice(&elements.to_le_bytes());
        body.extend_from_slice(&offset.to_le_bytes());
        body.extend_from_slice(data);
        Ok(Self {
            request: encode_request(SERVICE_WRITE_FRAGMENT, path, &body)?,
            offset,
        })
    }

    /// Returns the byte offset.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Serializes the request.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.request.clone()
    }
}

/// Read-Modify-Write (0x4E): the target applies
/// `value = (value | or_mask) & and_mask` atomically.
#[derive(Debug, Clone)]
pub struct ReadModifyWriteRequest {
    request: Vec<u8>,
}

impl ReadModifyWriteRequest {
    /// Creates a request with explicit 32-bit masks.
    pub fn new(path: &[u8], or_mask: u32, and_mask: u32) -> Result<Self> {
        let mut data = Vec::with_capacity(10);
        data.extend_from_slice(&RMW_MASK_SIZE.to_le_bytes());
        data.extend_from_slice(&or_mask.to_le_bytes());
        data.extend_from_slice(&and_mask.to_le_bytes());
        Ok(Self {
            request: encode_request(SERVICE_READ_MODIFY_WRITE, path, &data)?,
        })
    }

    /// Creates a request that sets or clears bit `bit` (0-31) of a DINT.
    ///
    /// # Example
    ///
    /// ```
    /// use ab_eip::service::ReadModifyWriteRequest;
    ///
    /// let path = [0x91, 0x02, b'F', b'l'];
    /// let bytes = ReadModifyWriteRequest::bit(&path, 5, true).unwrap().to_bytes();
    /// assert_eq!(&bytes[6..], &[0x04, 0x00, 0x20, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF]);
    /// ```
    pub fn bit(path: &[u8], bit: u32, state: bool) -> Result<Self> {
        let (or_mask, and_mask) = bit_masks(bit, state)?;
        Self::new(path, or_mask, and_mask)
    }

    /// Serializes the request.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.request.clone()
    }
}

/// Returns the `(or_mask, and_mask)` pair that sets or clears `bit`.
///
/// # Errors
///
/// Returns `InvalidParameter` if `bit` is above 31.
pub fn bit_masks(bit: u32, state: bool) -> Result<(u32, u32)> {
    if bit > 31 {
        return Err(EipError::invalid_parameter("bit", "must be 0-31"));
    }
    let mask = 1u32 << bit;
    Ok(if state { (mask, u32::MAX) } else { (0, !mask) })
}

/// Multiple Service Packet (0x0A) to the Message Router.
///
/// Layout after the path: count (u16), one u16 offset per request measured
/// from the count field, then the requests back to back.
#[derive(Debug, Clone)]
pub struct MultipleServiceRequest {
    requests: Vec<Vec<u8>>,
}

impl MultipleServiceRequest {
    /// Packs already-built requests.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `requests` is empty or the packet would
    /// exceed 65535 bytes.
    pub fn new(requests: Vec<Vec<u8>>) -> Result<Self> {
        if requests.is_empty() {
            return Err(EipError::invalid_parameter("requests", "cannot be empty"));
        }
        let size = 2 + 2 * requests.len() + requests.iter().map(Vec::len).sum::<usize>();
        if size > u16::MAX as usize {
            return Err(EipError::invalid_parameter(
                "requests",
                format!("packed size {size} exceeds 65535 bytes"),
            ));
        }
        Ok(Self { requests })
    }

    /// Returns the number of packed requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Returns whether no request is packed (never true once built).
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Serializes the packet.
    pub fn to_bytes(&self) -> Vec<u8> {
        let count = self.requests.len();
        let mut table = Vec::with_capacity(2 + 2 * count);
        table.extend_from_slice(&(count as u16).to_le_bytes());

        let mut offset = 2 + 2 * count;
        for request in &self.requests {
            table.extend_from_slice(&(offset as u16).to_le_bytes());
            offset += request.len();
        }
        for request in &self.requests {
            table.extend_from_slice(request);
        }

        let mut packet = Vec::with_capacity(2 + MESSAGE_ROUTER_PATH.len() + table.len());
        packet.push(SERVICE_MULTIPLE);
        packet.push((MESSAGE_ROUTER_PATH.len() / 2) as u8);
        packet.extend_from_slice(&MESSAGE_ROUTER_PATH);
        packet.extend_from_slice(&table);
        packet
    }
}

/// Route through the local backplane to `slot`.
pub fn backplane_route(slot: u8) -> Vec<u8> {
    vec![0x01, slot]
}

/// Unconnected Send (0x52): carries a request to a routed target.
#[derive(Debug, Clone)]
pub struct UnconnectedSend {
    embedded: Vec<u8>,
    route: Vec<u8>,
}

impl UnconnectedSend {
    /// Wraps `embedded` for delivery along `route` (port segments).
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the route is empty, of odd length or
    /// longer than 255 words, or if `embedded` exceeds 65535 bytes.
    pub fn new(embedded: Vec<u8>, route: Vec<u8>) -> Result<Self> {
        if route.is_empty() || route.len() % 2 != 0 || route.len() / 2 > u8::MAX as usize {
            return Err(EipError::invalid_parameter(
                "route",
                format!("route must be 2 to 510 bytes of whole words, got {}", route.len()),
            ));
        }
        if embedded.len() > u16::MAX as usize {
            return Err(EipError::invalid_parameter(
                "embedded",
                format!("{} bytes exceed the message size field", embedded.len()),
            ));
        }
        Ok(Self { embedded, route })
    }

    /// Serializes the request.
    ///
    /// Layout: `0x52, 2, CM path, priority, ticks, size (u16), request,
    /// [pad], route words, reserved, route`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut request = Vec::with_capacity(14 + self.embedded.len() + self.route.len());
        request.push(SERVICE_UNCONNECTED_SEND);
        request.push((CONNECTION_MANAGER_PATH.len() / 2) as u8);
        request.extend_from_slice(&CONNECTION_MANAGER_PATH);
        request.push(PRIORITY_TIME_TICK);
        request.push(UNCONNECTED_TIMEOUT_TICKS);
        request.extend_from_slice(&(self.embedded.len() as u16).to_le_bytes());
        request.extend_from_slice(&self.embedded);
        if self.embedded.len() % 2 != 0 {
            request.push(0x00);
        }
        request.push((self.route.len() / 2) as u8);
        request.push(0x00);
        request.extend_from_slice(&self.route);
        request
    }
}

fn connection_path(route: &[u8]) -> Vec<u8> {
    let mut path = route.to_vec();
    path.extend_from_slice(&MESSAGE_ROUTER_PATH);
    path
}

/// Forward Open (0x54): opens a class 3 connection to the Message Router.
#[derive(Debug, Clone)]
pub struct ForwardOpenRequest {
    /// T->O connection id chosen by the originator.
    pub t_o_connection_id: u32,
    /// Connection serial number.
    pub connection_serial: u16,
    /// Originator vendor id.
    pub vendor_id: u16,
    /// Originator serial number.
    pub originator_serial: u32,
    /// Requested packet interval in microseconds.
    pub rpi_us: u32,
    /// Route to the target (empty for a directly attached target).
    pub route: Vec<u8>,
}

impl ForwardOpenRequest {
    /// Serializes the request.
    pub fn to_bytes(&self) -> Vec<u8> {
        let params = CONNECTION_PARAMS_BASE | CONNECTION_SIZE;
        let path = connection_path(&self.route);

        let mut request = Vec::with_capacity(42 + path.len());
        request.push(SERVICE_FORWARD_OPEN);
        request.push((CONNECTION_MANAGER_PATH.len() / 2) as u8);
        request.extend_from_slice(&CONNECTION_MANAGER_PATH);
        request.push(PRIORITY_TIME_TICK);
        request.push(CONNECTION_TIMEOUT_TICKS);
        request.extend_from_slice(&0u32.to_le_bytes());
        request.extend_from_slice(&self.t_o_connection_id.to_le_bytes());
        request.extend_from_slice(&self.connection_serial.to_le_bytes());
        request.extend_from_slice(&self.vendor_id.to_le_bytes());
        request.extend_from_slice(&self.originator_serial.to_le_bytes());
        request.push(CONNECTION_TIMEOUT_MULTIPLIER);
        request.extend_from_slice(&[0x00, 0x00, 0x00]);
        request.extend_from_slice(&self.rpi_us.to_le_bytes());
        request.extend_from_slice(&params.to_le_bytes());
        request.extend_from_slice(&self.rpi_us.to_le_bytes());
        request.extend_from_slice(&params.to_le_bytes());
        request.push(TRANSPORT_CLASS_TRIGGER);
        request.push((path.len() / 2) as u8);
        request.extend_from_slice(&path);
        request
    }
}

/// Data of a successful Forward Open reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardOpenReply {
    /// Connection id for requests (O->T), chosen by the target.
    pub o_t_connection_id: u32,
    /// Connection id for replies (T->O).
    pub t_o_connection_id: u32,
    /// Echoed connection serial number.
    pub connection_serial: u16,
}

impl ForwardOpenReply {
    /// Parses the reply data (after the general status).
    ///
    /// # Errors
    ///
    /// Returns `MalformedResponse` if fewer than 10 bytes are given.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 10 {
            return Err(EipError::malformed_response(format!(
                "Forward Open reply too short: expected at least 10 bytes, got {}",
                data.len()
            ))
            .with_raw(data));
        }
        Ok(Self {
            o_t_connection_id: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            t_o_connection_id: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            connection_serial: u16::from_le_bytes([data[8], data[9]]),
        })
    }
}

/// Forward Close (0x4E to the Connection Manager).
#[derive(Debug, Clone)]
pub struct ForwardCloseRequest {
    /// Connection serial number used at Forward Open.
    pub connection_serial: u16,
    /// Originator vendor id.
    pub vendor_id: u16,
    /// Originator serial number.
    pub originator_serial: u32,
    /// Route used at Forward Open.
    pub route: Vec<u8>,
}

impl ForwardCloseRequest {
    /// Serializes the request.
    pub fn to_bytes(&self) -> Vec<u8> {
        let path = connection_path(&self.route);
        let mut request = Vec::with_capacity(18 + path.len());
        request.push(SERVICE_FORWARD_CLOSE);
        request.push((CONNECTION_MANAGER_PATH.len() / 2) as u8);
        request.extend_from_slice(&CONNECTION_MANAGER_PATH);
        request.push(PRIORITY_TIME_TICK);
        request.push(CONNECTION_TIMEOUT_TICKS);
        request.extend_from_slice(&self.connection_serial.to_le_bytes());
        request.extend_from_slice(&self.vendor_id.to_le_bytes());
        request.extend_from_slice(&self.originator_serial.to_le_bytes());
        request.push((path.len() / 2) as u8);
        request.push(0x00);
        request.extend_from_slice(&path);
        request
    }
}

/// One window of a fragmented transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    /// Byte offset of the window.
    pub offset: usize,
    /// Number of bytes in the window.
    pub size: usize,
    /// Whether this is the final window.
    pub last: bool,
}

/// Offsets and sizes of a transfer of `total` bytes in windows of at most
/// `max_fragment` bytes.
///
/// Offsets are `0, M, 2M, ...`; the last window ends exactly at `total`.
///
/// # Example
///
/// ```
/// use ab_eip::service::FragmentPlan;
///
/// let plan = FragmentPlan::new(20, 8).unwrap();
/// let offsets: Vec<usize> = plan.fragments().map(|f| f.offset).collect();
/// assert_eq!(offsets, vec![0, 8, 16]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentPlan {
    total: usize,
    max_fragment: usize,
}

impl FragmentPlan {
    /// Creates a plan.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `total` or `max_fragment` is 0.
    pub fn new(total: usize, max_fragment: usize) -> Result<Self> {
        if total == 0 {
            return Err(EipError::invalid_parameter("total", "must be at least 1"));
        }
        if max_fragment == 0 {
            return Err(EipError::invalid_parameter(
                "max_fragment_size",
                "must be at least 1",
            ));
        }
        Ok(Self {
            total,
            max_fragment,
        })
    }

    /// Returns the total number of bytes.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Returns the number of fragments, `ceil(total / max_fragment)`.
    pub fn len(&self) -> usize {
        self.total.div_ceil(self.max_fragment)
    }

    /// Always false; a plan covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterates the fragments in increasing offset order.
    pub fn fragments(&self) -> impl Iterator<Item = Fragment> + '_ {
        (0..self.len()).map(move |index| {
            let offset = index * self.max_fragment;
            let size = self.max_fragment.min(self.total - offset);
            Fragment {
                offset,
                size,
                last: offset + size == self.total,
            }
        })
    }

    /// Attributes an error to a fragment of a split transfer.
    ///
    /// A single-fragment plan returns the error unchanged.
    pub fn fragment_error(&self, fragment: Fragment, error: EipError) -> EipError {
        if self.len() == 1 {
            return error;
        }
        EipError::FragmentFailed {
            offset: fragment.offset,
            total: Some(self.total),
            source: Box::new(error),
        }
    }

    /// Checks a fragment reply against the plan.
    ///
    /// The reply must deliver exactly the planned size, and its continuation
    /// flag must be set on every fragment but the last.
    ///
    /// # Errors
    ///
    /// Returns `InconsistentFragmentation` on any disagreement.
    pub fn check(&self, fragment: Fragment, received: usize, more_data: bool) -> Result<()> {
        if received != fragment.size || more_data == fragment.last {
            return Err(EipError::InconsistentFragmentation {
                offset: fragment.offset,
                total: self.total,
                received,
                more_data,
            });
        }
        Ok(())
    }
}
