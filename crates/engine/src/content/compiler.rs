use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use roxmltree::{Document, Node};

use crate::sim::{FurniturePrototype, ParamValue};

use super::registry::check_prototype;
use super::types::{ContentErrorCode, ContentLoadError, SourceLocation};

/// Parses a `<Defs>` document holding `<FurnitureDef>` entries.
pub(crate) fn parse_furniture_defs_xml(
    mod_id: &str,
    file_path: &Path,
    raw: &str,
) -> Result<Vec<FurniturePrototype>, ContentLoadError> {
    let doc = Document::parse(raw).map_err(|error| ContentLoadError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        mod_id: mod_id.to_string(),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let cx = ParseContext {
        mod_id,
        file_path,
        doc: &doc,
    };
    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(cx.error_at(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            root,
        ));
    }

    let mut defs = Vec::<FurniturePrototype>::new();
    for child in root.children().filter(|node| node.is_element()) {
        if child.tag_name().name() != "FurnitureDef" {
            return Err(cx.error_at(
                ContentErrorCode::UnknownDefType,
                format!(
                    "unsupported def type <{}>; expected <FurnitureDef>",
                    child.tag_name().name()
                ),
                child,
            ));
        }
        defs.push(parse_furniture_def(&cx, child)?);
    }
    Ok(defs)
}

struct ParseContext<'a, 'input> {
    mod_id: &'a str,
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl ParseContext<'_, '_> {
    fn error_at(&self, code: ContentErrorCode, message: String, node: Node<'_, '_>) -> ContentLoadError {
        let pos = self.doc.text_pos_at(node.range().start);
        ContentLoadError {
            code,
            message,
            mod_id: self.mod_id.to_string(),
            file_path: self.file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }

    fn required_text(&self, node: Node<'_, '_>, field_name: &str) -> Result<String, ContentLoadError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self.error_at(
                ContentErrorCode::MissingField,
                format!("field <{field_name}> must not be empty"),
                node,
            ));
        }
        Ok(value)
    }

    fn parsed<T: std::str::FromStr>(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
        expected: &str,
    ) -> Result<T, ContentLoadError> {
        let value = self.required_text(node, field_name)?;
        value.parse::<T>().map_err(|_| {
            self.error_at(
                ContentErrorCode::InvalidValue,
                format!("{field_name} '{value}' is not a valid {expected}"),
                node,
            )
        })
    }
}

fn parse_furniture_def(
    cx: &ParseContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<FurniturePrototype, ContentLoadError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut object_type: Option<String> = None;
    let mut prototype = FurniturePrototype::new(String::new());

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        if !seen_fields.insert(field_name.clone()) {
            return Err(cx.error_at(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{field_name}> in <FurnitureDef>"),
                field,
            ));
        }

        match field_name.as_str() {
            "objectType" => object_type = Some(cx.required_text(field, "objectType")?),
            "name" => prototype.name = cx.required_text(field, "name")?,
            "movementCost" => prototype.movement_cost = cx.parsed(field, "movementCost", "number")?,
            "width" => prototype.width = cx.parsed(field, "width", "integer")?,
            "height" => prototype.height = cx.parsed(field, "height", "integer")?,
            "canLinkToNeighbour" => {
                prototype.can_link_to_neighbour = cx.parsed(field, "canLinkToNeighbour", "boolean")?
            }
            "canEncloseRooms" => {
                prototype.can_enclose_rooms = cx.parsed(field, "canEncloseRooms", "boolean")?
            }
            "updateHooks" => prototype.update_hooks = parse_list(cx, field, "updateHooks")?,
            "isEnterableHook" => {
                prototype.enterability_hook = Some(cx.required_text(field, "isEnterableHook")?)
            }
            "parameters" => prototype.parameters = parse_parameters(cx, field)?,
            "workSpotOffsetX" => {
                prototype.work_spot_offset.x = cx.parsed(field, "workSpotOffsetX", "integer")?
            }
            "workSpotOffsetY" => {
                prototype.work_spot_offset.y = cx.parsed(field, "workSpotOffsetY", "integer")?
            }
            "spawnSpotOffsetX" => {
                prototype.spawn_spot_offset.x = cx.parsed(field, "spawnSpotOffsetX", "integer")?
            }
            "spawnSpotOffsetY" => {
                prototype.spawn_spot_offset.y = cx.parsed(field, "spawnSpotOffsetY", "integer")?
            }
            _ => {
                return Err(cx.error_at(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{field_name}> in <FurnitureDef>"),
                    field,
                ))
            }
        }
    }

    let Some(object_type) = object_type else {
        return Err(cx.error_at(
            ContentErrorCode::MissingField,
            "missing required field <objectType> in <FurnitureDef>".to_string(),
            node,
        ));
    };
    prototype.object_type = object_type;

    check_prototype(&prototype)
        .map_err(|reason| cx.error_at(ContentErrorCode::InvalidValue, reason, node))?;
    Ok(prototype)
}

fn parse_list(
    cx: &ParseContext<'_, '_>,
    node: Node<'_, '_>,
    field_name: &str,
) -> Result<Vec<String>, ContentLoadError> {
    let mut items = Vec::new();
    for item in node.children().filter(|child| child.is_element()) {
        if item.tag_name().name() != "li" {
            return Err(cx.error_at(
                ContentErrorCode::UnknownField,
                format!("<{field_name}> accepts only <li> entries"),
                item,
            ));
        }
        items.push(cx.required_text(item, field_name)?);
    }
    Ok(items)
}

fn parse_parameters(
    cx: &ParseContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<BTreeMap<String, ParamValue>, ContentLoadError> {
    let mut parameters = BTreeMap::new();
    for entry in node.children().filter(|child| child.is_element()) {
        let key = entry.tag_name().name().to_string();
        let raw = entry.text().map(str::trim).unwrap_or_default();
        if parameters.insert(key.clone(), infer_param(raw)).is_some() {
            return Err(cx.error_at(
                ContentErrorCode::DuplicateField,
                format!("duplicate parameter <{key}>"),
                entry,
            ));
        }
    }
    Ok(parameters)
}

fn infer_param(raw: &str) -> ParamValue {
    if let Ok(value) = raw.parse::<bool>() {
        return ParamValue::Bool(value);
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => ParamValue::Number(value),
        _ => ParamValue::Text(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::TileOffset;

    fn parse(raw: &str) -> Result<Vec<FurniturePrototype>, ContentLoadError> {
        parse_furniture_defs_xml("base", Path::new("defs.xml"), raw)
    }

    #[test]
    fn furniture_def_maps_fields_and_defaults() {
        let defs = parse(
            r#"<Defs>
                <FurnitureDef>
                    <objectType>Door</objectType>
                    <updateHooks><li>OnUpdate_Door</li></updateHooks>
                    <isEnterableHook>IsEnterable_Door</isEnterableHook>
                    <parameters><openPercent>0</openPercent><isOpening>false</isOpening><label>oak</label></parameters>
                    <workSpotOffsetY>-1</workSpotOffsetY>
                </FurnitureDef>
            </Defs>"#,
        )
        .expect("parse");
        let door = &defs[0];
        assert_eq!(door.object_type, "Door");
        assert_eq!(door.update_hooks, vec!["OnUpdate_Door".to_string()]);
        assert_eq!(door.parameters["openPercent"], ParamValue::Number(0.0));
        assert_eq!(door.parameters["isOpening"], ParamValue::Bool(false));
        assert_eq!(door.parameters["label"], ParamValue::Text("oak".to_string()));
        assert_eq!(door.work_spot_offset, TileOffset::new(0, -1));
        assert_eq!((door.width, door.height), (1, 1));
        assert_eq!(door.movement_cost, 1.0);
    }

    #[test]
    fn missing_object_type_reports_location() {
        let err = parse(r#"<Defs><FurnitureDef><name>X</name></FurnitureDef></Defs>"#)
            .expect_err("missing");
        assert_eq!(err.code, ContentErrorCode::MissingField);
        assert_eq!(err.mod_id, "base");
        assert!(err.location.is_some());
    }

    #[test]
    fn unknown_and_duplicate_fields_error() {
        let err = parse(
            r#"<Defs><FurnitureDef><objectType>a</objectType><mood>Happy</mood></FurnitureDef></Defs>"#,
        )
        .expect_err("unknown");
        assert_eq!(err.code, ContentErrorCode::UnknownField);

        let err = parse(
            r#"<Defs><FurnitureDef><objectType>a</objectType><width>1</width><width>2</width></FurnitureDef></Defs>"#,
        )
        .expect_err("duplicate");
        assert_eq!(err.code, ContentErrorCode::DuplicateField);
    }

    #[test]
    fn invalid_values_error() {
        let err = parse(
            r#"<Defs><FurnitureDef><objectType>a</objectType><width>wide</width></FurnitureDef></Defs>"#,
        )
        .expect_err("width");
        assert_eq!(err.code, ContentErrorCode::InvalidValue);

        let err = parse(
            r#"<Defs><FurnitureDef><objectType>a</objectType><movementCost>-2</movementCost></FurnitureDef></Defs>"#,
        )
        .expect_err("cost");
        assert_eq!(err.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn wrong_root_and_def_type_error() {
        assert_eq!(
            parse("<Things/>").expect_err("root").code,
            ContentErrorCode::InvalidRoot
        );
        assert_eq!(
            parse("<Defs><EntityDef/></Defs>").expect_err("def").code,
            ContentErrorCode::UnknownDefType
        );
        assert_eq!(
            parse("<Defs><FurnitureDef></Defs>").expect_err("xml").code,
            ContentErrorCode::XmlMalformed
        );
    }
}
