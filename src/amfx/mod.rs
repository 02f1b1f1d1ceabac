//! AMFX: the XML rendering of AMF3
//!
//! AMFX carries the same object graph as binary AMF3 in a readable form.
//! It is used for request tracing and by XML-only clients. Only the
//! writer is provided; documents are produced from the same
//! [`WireValue`](crate::amf::WireValue) model as the binary codec.
//!
//! ```text
//! <?xml version="1.0" encoding="utf-8"?>
//! <amfx ver="3">
//!   <header name="DSId" mustUnderstand="false"><string>..</string></header>
//!   <body targetURI="/1/onResult" responseURI="null">
//!     <object type="com.example.Order">
//!       <traits><string>id</string></traits>
//!       <int>7</int>
//!     </object>
//!   </body>
//! </amfx>
//! ```

pub mod escape;
pub mod serializer;
pub mod writer;

pub use serializer::AmfxSerializer;
pub use writer::{format_double, AmfxWriter};

#[cfg(test)]
mod tests {
    use crate::amf::traits::Traits;
    use crate::amf::value::{Node, SharedValue, WireArray, WireDictionary, WireObject};
    use crate::amf::{Amf3Encoder, ObjectGraph, WireValue};

    use super::AmfxWriter;

    /// Render with both codecs and compare every table's handle count
    fn assert_parity(graph: &ObjectGraph, root: &WireValue) -> (Vec<u8>, String) {
        let mut binary = Amf3Encoder::new();
        binary.encode(graph, root).unwrap();
        let mut xml = AmfxWriter::new();
        xml.write_value(graph, root).unwrap();

        assert_eq!(binary.object_handles(), xml.object_handles());
        assert_eq!(binary.string_handles(), xml.string_handles());
        assert_eq!(binary.traits_handles(), xml.traits_handles());
        (binary.finish().to_vec(), xml.finish())
    }

    #[test]
    fn test_parity_cycle() {
        let mut graph = ObjectGraph::new();
        let child = graph.add_dynamic_object(Vec::new());
        let root = graph.add_array(WireArray::dense(vec![child.clone(), WireValue::Date(0.0)]));
        let child_id = child.as_node().unwrap();
        graph
            .object_mut(child_id)
            .unwrap()
            .dynamic_members
            .push(("parent".into(), root.clone()));

        let (bytes, xml) = assert_parity(&graph, &root);
        // Binary back-reference to handle 0 for the root array
        assert!(bytes.windows(2).any(|w| w == [0x09, 0x00]));
        assert!(xml.contains("<item name=\"parent\"><ref index=\"0\"/></item>"));
    }

    #[test]
    fn test_parity_mixed_members() {
        let mut graph = ObjectGraph::new();
        let traits = graph
            .traits_mut()
            .insert(Traits::new("com.example.Order", vec!["id".into(), "note".into()], true, false).unwrap());
        let shared = graph.add_array(WireArray::dense(vec!["note".into()]));
        let order = graph.push(Node::Object(WireObject {
            traits,
            members: vec![WireValue::Integer(7), "id".into()],
            dynamic_members: vec![
                ("extra".into(), shared.clone()),
                ("again".into(), shared),
                ("com.example.Order".into(), WireValue::ByteArray(vec![1])),
            ],
        }));
        let root = graph.add_array(WireArray::dense(vec![
            WireValue::Node(order),
            WireValue::Node(order),
        ]));

        let (_, xml) = assert_parity(&graph, &root);
        assert!(xml.contains("<string index=\"1\"/>"));
        assert!(xml.contains("<ref index=\"2\"/>"));
        assert!(xml.contains("<ref index=\"1\"/>"));
    }

    #[test]
    fn test_parity_empty_array() {
        let mut graph = ObjectGraph::new();
        let empty = graph.add_array(WireArray::default());
        let root = graph.add_array(WireArray::dense(vec![empty.clone(), empty]));

        let (bytes, xml) = assert_parity(&graph, &root);
        assert_eq!(bytes, vec![0x09, 0x05, 0x01, 0x09, 0x01, 0x01, 0x09, 0x02]);
        assert_eq!(
            xml,
            "<array length=\"2\"><array length=\"0\"></array><ref index=\"1\"/></array>"
        );
    }

    #[test]
    fn test_parity_shared_bytes() {
        let mut graph = ObjectGraph::new();
        let bytes = graph.add_shared(SharedValue::ByteArray(vec![0xAB]));
        let root = graph.add_array(WireArray::dense(vec![bytes.clone(), bytes, WireValue::Date(0.0)]));

        let (bytes, xml) = assert_parity(&graph, &root);
        assert_eq!(&bytes[3..8], &[0x0C, 0x03, 0xAB, 0x0C, 0x02]);
        assert_eq!(
            xml,
            "<array length=\"3\"><bytearray>AB</bytearray><ref index=\"1\"/><date>0</date></array>"
        );
    }

    #[test]
    fn test_parity_weak_dictionary() {
        let mut graph = ObjectGraph::new();
        let key = graph.add_dynamic_object(vec![("k".into(), "v".into())]);
        let dictionary = graph.add_dictionary(WireDictionary {
            weak_keys: true,
            entries: vec![(key.clone(), "first".into()), ("v".into(), key)],
        });

        let (bytes, xml) = assert_parity(&graph, &dictionary);
        assert_eq!(bytes[2], 0x01);
        assert!(xml.starts_with("<dictionary length=\"2\" weakKeys=\"true\">"));
        assert!(xml.contains("<string index=\"1\"/>"));
        assert!(xml.ends_with("<ref index=\"1\"/></dictionary>"));
    }
}
