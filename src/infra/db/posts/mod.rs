mod read;
mod types;
mod write;

const POST_COLUMNS: &str = "p.id, p.text, p.author_id, p.group_id, p.image, p.created_at";
