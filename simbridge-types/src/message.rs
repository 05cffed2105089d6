//! The tagged union of every message value this crate knows.

use crate::{
    Clock, Header, SetBoolRequest, SetBoolResponse, StringMessage, TfMessage, TransformStamped,
    TriggerRequest, TriggerResponse,
};

/// A concrete message value with a fixed schema.
///
/// Implemented for every type carried by [`Message`].
pub trait MessageValue: Clone + Into<Message> + Send + Sync + 'static {
    /// The schema name, e.g. `"tf2_msgs/TFMessage"`.
    const SCHEMA: &'static str;

    /// Borrow the value out of a [`Message`] if it carries this type.
    fn from_message(message: &Message) -> Option<&Self>;
}

macro_rules! messages {
    ($($variant:ident($ty:ty) => $schema:expr,)+) => {
        /// One message instance of a known schema.
        ///
        /// Converters are looked up by schema name and receive values of this
        /// type; handing a converter the wrong variant is reported as a schema
        /// mismatch rather than a panic.
        #[derive(Debug, Clone, PartialEq)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[non_exhaustive]
        pub enum Message {
            $($variant($ty),)+
        }

        impl Message {
            /// The schema name of the carried value.
            pub fn schema(&self) -> &'static str {
                match self {
                    $(Message::$variant(_) => $schema,)+
                }
            }
        }

        $(
            impl MessageValue for $ty {
                const SCHEMA: &'static str = $schema;

                fn from_message(message: &Message) -> Option<&Self> {
                    match message {
                        Message::$variant(value) => Some(value),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }

            impl From<$ty> for Message {
                fn from(value: $ty) -> Self {
                    Message::$variant(value)
                }
            }

            impl TryFrom<Message> for $ty {
                type Error = Message;

                fn try_from(message: Message) -> Result<Self, Message> {
                    match message {
                        Message::$variant(value) => Ok(value),
                        #[allow(unreachable_patterns)]
                        other => Err(other),
                    }
                }
            }
        )+
    };
}

messages! {
    TfMessage(TfMessage) => crate::schema::TF_MESSAGE,
    TransformStamped(TransformStamped) => crate::schema::TRANSFORM_STAMPED,
    Clock(Clock) => crate::schema::CLOCK,
    String(StringMessage) => crate::schema::STRING,
    Header(Header) => crate::schema::HEADER,
    SetBoolRequest(SetBoolRequest) => "std_srvs/SetBoolRequest",
    SetBoolResponse(SetBoolResponse) => "std_srvs/SetBoolResponse",
    TriggerRequest(TriggerRequest) => "std_srvs/TriggerRequest",
    TriggerResponse(TriggerResponse) => "std_srvs/TriggerResponse",
}
