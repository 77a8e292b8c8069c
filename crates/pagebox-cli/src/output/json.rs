use pagebox_core::error::PageboxError;
use pagebox_core::model::ProjectData;
use pagebox_core::project::to_json;

pub fn print(data: &ProjectData) -> Result<(), PageboxError> {
    println!("{}", to_json(data)?);
    Ok(())
}
